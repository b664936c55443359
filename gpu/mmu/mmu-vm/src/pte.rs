//! # Page Table Entries

use crate::{Access, Aperture, Mmu, Platform};

impl<P: Platform> Mmu<P> {
    /// Encode the entry mapping the page at bus address `phys`.
    ///
    /// The entry is valid, carries `memtype` whole and the raw value of
    /// `aperture`. `SYS` follows `access.sys()`; `READ_ONLY` is set unless
    /// `access` grants write.
    #[must_use]
    pub fn encode_pte(&self, phys: u64, memtype: u32, aperture: Aperture, access: Access) -> u64 {
        let layout = self.layout();
        let pte = &layout.pte;

        let mut word = pte.address.place(phys >> pte.address.shift())
            | pte.valid.place(layout.valid())
            | pte.memtype.place(u64::from(memtype))
            | pte.aperture.place(layout.aperture(aperture));
        if access.sys() {
            word = pte.sys.set(word, 1);
        }
        if !access.write() {
            word = pte.read_only.set(word, 1);
        }
        word
    }
}
