//! The shift engine that moves bits between the probe and the target.  Hardware back ends
//! implement the `Cable` trait; `gpio::Gpio` bit-bangs it on plain embedded-hal pins.
pub mod gpio;

/// Drives TCK together with either TMS or TDI/TDO, 1 to 32 bits per call, least significant bit
/// first.  Implementations perform no bounds checks beyond clamping to 32 bits, and assume the
/// pins have already been configured.
pub trait Cable {
    /// Clock `pattern` out on TMS for `bit_count` TCK cycles.  TDI is held low.
    fn shift_tms(&mut self, bit_count: u32, pattern: u32);

    /// Clock `write_value` out on TDI while sampling TDO once per bit, with TMS held low so the
    /// TAP stays in its shift state.  Only the low `bit_count` bits of the result are meaningful.
    fn shift_data(&mut self, bit_count: u32, write_value: u32) -> u32;

    /// Hold TMS high with nTRST asserted for `bit_count` clocks.  This resets the target without
    /// going through the modeled state machine, so the caller has to resynchronize it.
    fn drive_reset(&mut self, bit_count: u32);
}
