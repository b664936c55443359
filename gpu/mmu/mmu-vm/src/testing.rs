//! Fakes shared by the unit tests.

use crate::{GpuMemory, Mmu, MmuConfig, Platform, TableAlloc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use mmu_registers::{Mmio, Timer};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once};

const FLUSH_CTRL: u32 = 0x0010_0c80;

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Logger that keeps each test thread's records apart.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        RECORDS.with_borrow_mut(|records| {
            records.push((record.level(), record.args().to_string()));
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Start capturing this thread's log records, dropping earlier ones.
pub fn capture_logs() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger in unit tests");
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with_borrow_mut(Vec::clear);
}

/// Messages of `level` logged on this thread since [`capture_logs`].
pub fn logged(level: Level) -> Vec<String> {
    RECORDS.with_borrow(|records| {
        records
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    })
}

/// What the fake device observed, in order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
    BarFlush,
    /// Flush-control write with this engine code.
    Kick(u8),
}

#[derive(Default)]
struct FlushCtrl {
    value: u32,
    /// Reads left that still report busy.
    busy_reads: u32,
    in_flight: bool,
    /// Kicks issued while an earlier one was still pending.
    overlaps: usize,
    events: Vec<Event>,
}

/// Register file with only the flush-control register, a clock that
/// advances 1 µs per read, and a BAR that records its flushes.
pub struct FakePlatform {
    stolen: Option<u64>,
    /// Bit `n` set: flushes of engine code `n` never complete.
    stuck: u16,
    busy_reads: u32,
    ctrl: Mutex<FlushCtrl>,
    clock: AtomicU64,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            stolen: None,
            stuck: 0,
            busy_reads: 1,
            ctrl: Mutex::default(),
            clock: AtomicU64::new(0),
        }
    }

    pub fn with_stolen(mut self, base: u64) -> Self {
        self.stolen = Some(base);
        self
    }

    pub fn with_stuck(mut self, code: u8) -> Self {
        self.stuck |= 1 << code;
        self
    }

    pub fn with_busy_reads(mut self, reads: u32) -> Self {
        self.busy_reads = reads;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.ctrl.lock().unwrap().events.clone()
    }

    pub fn overlaps(&self) -> usize {
        self.ctrl.lock().unwrap().overlaps
    }

    /// Current flush-control value, without the side effects of a read.
    pub fn ctrl(&self) -> u32 {
        self.ctrl.lock().unwrap().value
    }
}

impl Mmio for FakePlatform {
    fn rd32(&self, addr: u32) -> u32 {
        assert_eq!(addr, FLUSH_CTRL, "unexpected register read");
        let mut ctrl = self.ctrl.lock().unwrap();
        if ctrl.value & 1 != 0 {
            if ctrl.busy_reads > 0 {
                ctrl.busy_reads -= 1;
            } else {
                ctrl.value &= !1;
                ctrl.in_flight = false;
            }
        }
        ctrl.value
    }

    fn wr32(&self, addr: u32, value: u32) {
        assert_eq!(addr, FLUSH_CTRL, "unexpected register write");
        let code = ((value >> 16) & 0xf) as u8;
        let mut ctrl = self.ctrl.lock().unwrap();
        if ctrl.in_flight {
            ctrl.overlaps += 1;
        }
        ctrl.in_flight = value & 1 != 0;
        ctrl.value = value;
        ctrl.busy_reads = if self.stuck & (1 << code) != 0 {
            u32::MAX
        } else {
            self.busy_reads
        };
        ctrl.events.push(Event::Kick(code));
    }
}

impl Timer for FakePlatform {
    fn read_ns(&self) -> u64 {
        self.clock.fetch_add(1_000, Ordering::Relaxed)
    }
}

impl Platform for FakePlatform {
    fn bar_flush(&self) {
        self.ctrl.lock().unwrap().events.push(Event::BarFlush);
    }

    fn stolen_base(&self) -> Option<u64> {
        self.stolen
    }
}

/// MMU of `chipset` on `platform`, with a 100 µs flush timeout.
pub fn mmu_on(platform: FakePlatform, chipset: u32) -> Mmu<FakePlatform> {
    let config = MmuConfig::default().with_flush_timeout_ns(100_000);
    Mmu::probe(platform, chipset, config).expect("chipset has an MMU")
}

/// NV50 (discrete) MMU on `platform`.
pub fn tesla_mmu_on(platform: FakePlatform) -> Mmu<FakePlatform> {
    mmu_on(platform, 0x50)
}

/// MCP77 (integrated) MMU on `platform`.
pub fn igp_mmu_on(platform: FakePlatform) -> Mmu<FakePlatform> {
    mmu_on(platform, 0xaa)
}

pub fn tesla_mmu() -> Mmu<FakePlatform> {
    tesla_mmu_on(FakePlatform::new())
}

/// GPU object backed by a vector of words.
#[derive(Debug)]
pub struct VecMemory {
    addr: u64,
    words: Vec<u32>,
}

impl VecMemory {
    pub fn new(addr: u64, size: u64) -> Self {
        Self {
            addr,
            words: vec![0; (size / 4) as usize],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }
}

impl GpuMemory for VecMemory {
    fn addr(&self) -> u64 {
        self.addr
    }

    fn size(&self) -> u64 {
        self.words.len() as u64 * 4
    }

    fn rd32(&self, offset: u64) -> u32 {
        self.words[(offset / 4) as usize]
    }

    fn wr32(&mut self, offset: u64, value: u32) {
        self.words[(offset / 4) as usize] = value;
    }
}

/// Bump allocator for directory and table objects; never reuses addresses.
pub struct BumpTables {
    next: u64,
    /// Allocations left before reporting out of memory.
    budget: Option<usize>,
    pub live: Vec<u64>,
    pub freed: Vec<u64>,
}

impl BumpTables {
    pub fn new() -> Self {
        Self {
            next: 0x0100_0000,
            budget: None,
            live: Vec::new(),
            freed: Vec::new(),
        }
    }

    pub fn with_budget(mut self, allocations: usize) -> Self {
        self.budget = Some(allocations);
        self
    }
}

impl TableAlloc for BumpTables {
    type Object = VecMemory;

    fn alloc_table(&mut self, size: u64, align: u64) -> Option<VecMemory> {
        if let Some(budget) = &mut self.budget {
            *budget = budget.checked_sub(1)?;
        }
        let addr = self.next.next_multiple_of(align);
        self.next = addr + size;
        self.live.push(addr);
        Some(VecMemory::new(addr, size))
    }

    fn free_table(&mut self, object: VecMemory) {
        self.live.retain(|&addr| addr != object.addr());
        self.freed.push(object.addr());
    }
}
