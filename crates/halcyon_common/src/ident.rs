//! Interned identifiers for cheap cloning and O(1) equality comparison.
//!
//! Every symbolic name in a Halcyon context (cell names, net names, port
//! names, bel/wire/pip names, attribute keys) is interned into an [`Ident`],
//! a dense `u32` index into the context's [`Interner`]. Handle 0 is always
//! the empty string, and the [`ConstIds`] table is interned first at context
//! creation so that well-known handles occupy a stable prefix shared by all
//! architectures.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for any named entity in a context.
///
/// Identifiers are interned strings represented as a `u32` index into the
/// context's string interner. This provides O(1) equality comparison and
/// O(1) cloning. An `Ident` is only meaningful together with the
/// [`Interner`] that minted it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// The reserved handle of the empty string.
    pub const EMPTY: Ident = Ident(0);

    /// Creates an `Ident` from a raw `u32` index.
    ///
    /// This is primarily intended for deserialization and testing.
    /// In normal use, identifiers should be created through
    /// [`Interner::intern`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns whether this is the reserved empty-string handle.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for Ident {
    /// The empty-string handle.
    fn default() -> Self {
        Ident::EMPTY
    }
}

// SAFETY: `Ident` wraps a `u32` which is always a valid `usize` on 32-bit
// and 64-bit platforms. `try_from_usize` rejects values that don't fit.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// Thread-safe string interner backed by [`lasso::ThreadedRodeo`].
///
/// Interning is idempotent: the same string always yields the same handle.
/// Construction reserves handle 0 for the empty string.
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates a new interner with the empty string pre-interned at handle 0.
    pub fn new() -> Self {
        let rodeo = ThreadedRodeo::new();
        let empty = rodeo.get_or_intern("");
        debug_assert_eq!(empty, Ident::EMPTY);
        Self { rodeo }
    }

    /// Interns a string, returning its [`Ident`]. If the string was already
    /// interned, returns the existing handle without allocating.
    pub fn intern(&self, s: &str) -> Ident {
        self.rodeo.get_or_intern(s)
    }

    /// Returns the handle of `s` if it has been interned, without interning.
    pub fn get(&self, s: &str) -> Option<Ident> {
        self.rodeo.get(s)
    }

    /// Resolves an [`Ident`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the `Ident` was not created by this interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }

    /// Returns the number of interned strings (including the empty string).
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    /// Always false: handle 0 exists from construction.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

/// A hierarchical name as a sequence of interned components.
///
/// `IdentList` concatenates handles instead of materializing a joined
/// string; equality and ordering are lexicographic on the component array.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct IdentList(Vec<Ident>);

impl IdentList {
    /// Creates an empty component list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates a single-component list.
    pub fn single(ident: Ident) -> Self {
        Self(vec![ident])
    }

    /// Creates a list from components in order.
    pub fn from_parts(parts: Vec<Ident>) -> Self {
        Self(parts)
    }

    /// Returns the components in order.
    pub fn parts(&self) -> &[Ident] {
        &self.0
    }

    /// Returns the number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there are no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new list with `ident` appended.
    pub fn join(&self, ident: Ident) -> Self {
        let mut parts = self.0.clone();
        parts.push(ident);
        Self(parts)
    }

    /// Renders the hierarchical name, joining components with `sep`.
    pub fn display(&self, interner: &Interner, sep: char) -> String {
        let mut out = String::new();
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(sep);
            }
            out.push_str(interner.resolve(*part));
        }
        out
    }
}

impl fmt::Display for IdentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "#{}", part.as_raw())?;
        }
        Ok(())
    }
}

macro_rules! const_ids {
    ($( $(#[$meta:meta])* $field:ident => $text:literal ),* $(,)?) => {
        /// Well-known identifiers interned at context creation.
        ///
        /// Interning this table first gives every architecture the same
        /// stable prefix of handles for the names that generic code (the
        /// packer in particular) refers to directly.
        #[derive(Clone, Debug)]
        #[allow(missing_docs)]
        pub struct ConstIds {
            $( $(#[$meta])* pub $field: Ident, )*
        }

        impl ConstIds {
            /// Interns the full table into `interner` and captures the handles.
            pub fn new(interner: &Interner) -> Self {
                Self {
                    $( $field: interner.intern($text), )*
                }
            }
        }
    };
}

const_ids! {
    // Common ports
    a => "A", b => "B", c => "C", d => "D", e => "E", f => "F",
    m => "M", di => "DI", q => "Q", z => "Z", i => "I", o => "O", t => "T",
    sel => "SEL", ofx => "OFX", f1 => "F1",
    clk => "CLK", ce => "CE", lsr => "LSR",
    ck => "CK", sp => "SP", cd => "CD", pd => "PD",
    cin => "CIN", cout => "COUT", fci => "FCI", fco => "FCO",
    wck => "WCK", wre => "WRE", wcko => "WCKO", wreo => "WREO", wdi => "WDI",
    // Common parameters and attributes
    init => "INIT", init0 => "INIT0", init1 => "INIT1", initval => "INITVAL",
    mode => "MODE", inject => "INJECT", wid => "WID",
    clkmux => "CLKMUX", cemux => "CEMUX", lsrmux => "LSRMUX",
    srmode => "SRMODE", regset => "REGSET", lsrmode => "LSRMODE",
    bel => "BEL", loc => "LOC", io_type => "IO_TYPE",
    // Source primitives
    lut4 => "LUT4", inv => "INV", vhi => "VHI", vlo => "VLO",
    vcc_drv => "VCC_DRV", ccu2 => "CCU2", widefn9 => "WIDEFN9",
    dpr16x4 => "DPR16X4",
    fd1p3bx => "FD1P3BX", fd1p3dx => "FD1P3DX",
    fd1p3ix => "FD1P3IX", fd1p3jx => "FD1P3JX",
    dp16k => "DP16K", pdp16k => "PDP16K", pdpsc16k => "PDPSC16K",
    pll => "PLL", osca => "OSCA",
    dp16k_mode => "DP16K_MODE", pdp16k_mode => "PDP16K_MODE",
    pdpsc16k_mode => "PDPSC16K_MODE",
    iddrx1 => "IDDRX1", oddrx1 => "ODDRX1",
    mult9x9 => "MULT9X9", mult18x18 => "MULT18X18", mult18x36 => "MULT18X36",
    mult36x36 => "MULT36X36", multaddsub18x18 => "MULTADDSUB18X18",
    // Packed cell types
    slice_comb => "SLICE_COMB", slice_ff => "SLICE_FF", ramw => "RAMW",
    ebr_core => "EBR_CORE", iologic => "IOLOGIC",
    preadd9_core => "PREADD9_CORE", mult9_core => "MULT9_CORE",
    mult18_core => "MULT18_CORE", mult18x36_core => "MULT18X36_CORE",
    reg18_core => "REG18_CORE", acc54_core => "ACC54_CORE",
    // IO buffers
    ib => "IB", ob => "OB", obz => "OBZ", bb => "BB",
    iob_core => "IOB_CORE",
    npnr_ibuf => "$halcyon_ibuf", npnr_obuf => "$halcyon_obuf",
    npnr_iobuf => "$halcyon_iobuf",
    paddi => "PADDI", paddo => "PADDO", paddt => "PADDT", iopad => "IOPAD",
    // Global resources
    dcc => "DCC", dcs => "DCS", osc_core => "OSC_CORE", pll_core => "PLL_CORE",
    clki => "CLKI", clko => "CLKO", clk0 => "CLK0", clk1 => "CLK1",
    dcsout => "DCSOUT", refck => "REFCK", hfclkout => "HFCLKOUT",
    lfclkout => "LFCLKOUT",
    sig_async => "$async$",
}
