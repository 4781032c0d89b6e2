//! The shared status-flag vector: five independent 8-bit fields plus the
//! last-completed and currently-reported template id characters.
//!
//! Bit positions inside each byte are part of the wire contract (the host
//! reads them raw) and must never move. Each byte carries a named "unmask"
//! bit that is always set; it keeps a fully-clear byte (0x00) from ever
//! appearing on the wire, where it would be ambiguous with absent data.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags1: u8 {
        const VOLTAGE_ERROR = 1 << 0;
        const HEAD_ERROR    = 1 << 1;
        const PAPER_OUT     = 1 << 2;
        const PLATEN_UP     = 1 << 3;
        const SYSTEM_ERROR  = 1 << 4;
        const BUSY          = 1 << 5;
        const UNMASK        = 1 << 6;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags2: u8 {
        const JOB_MEMORY_OVERFLOW     = 1 << 0;
        const BUFFER_OVERFLOW         = 1 << 1;
        const LIBRARY_LOAD_ERROR      = 1 << 2;
        const PRINT_REGION_DATA_ERROR = 1 << 3;
        const LIBRARY_REF_ERROR       = 1 << 4;
        const TEMPERATURE_ERROR       = 1 << 5;
        const UNMASK                  = 1 << 6;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags3: u8 {
        const MISSING_SUPPLY_INDEX     = 1 << 0;
        const PRINTER_OFFLINE          = 1 << 1;
        const FLASH_PROGRAM_ERROR      = 1 << 2;
        const PAPER_IN_CHUTE           = 1 << 3;
        const PRINT_LIBRARIES_CORRUPT  = 1 << 4;
        const COMMAND_ERROR            = 1 << 5;
        const UNMASK                   = 1 << 6;
    }
}

bitflags! {
    // `Reserved` at bit 6 is deliberately not named here: it aliases the
    // unmask bit in the source device, and the only behavior anyone has
    // ever observed is "always 1". Naming it would invite a future caller
    // to clear it by mistake.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags4: u8 {
        const PAPER_LOW          = 1 << 0;
        const PAPER_JAM          = 1 << 5;
        const UNMASK             = 1 << 6;
        const JOURNAL_PRINT_MODE = 1 << 7;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags5: u8 {
        const RESET_POWER_UP           = 1 << 0;
        const BARCODE_DATA_IS_ACCESSED = 1 << 1;
        const PRINTER_OPEN             = 1 << 2;
        const XED_OFF                  = 1 << 3;
        const AT_TOP_OF_FORM           = 1 << 4;
        const VALIDATION_DONE          = 1 << 5;
        const UNMASK                   = 1 << 6;
    }
}

/// Space: the template-id character used before any job has ever completed.
pub const NO_TEMPLATE: u8 = b' ';

/// The shared, mutex-guarded flag register. Owned by the engine; every
/// component that touches it (dispatcher, print-job state machine, paper
/// chute oscillator) does so through these methods, never by poking bits
/// directly, so the unmask invariant can't be violated by accident.
#[derive(Debug, Clone)]
pub struct StatusVector {
    flags1: Flags1,
    flags2: Flags2,
    flags3: Flags3,
    flags4: Flags4,
    flags5: Flags5,
    last_template_id: u8,
    status_report_template_id: u8,
}

impl Default for StatusVector {
    fn default() -> Self {
        Self {
            flags1: Flags1::UNMASK,
            flags2: Flags2::UNMASK,
            flags3: Flags3::UNMASK,
            flags4: Flags4::UNMASK,
            flags5: Flags5::UNMASK | Flags5::VALIDATION_DONE | Flags5::RESET_POWER_UP,
            last_template_id: NO_TEMPLATE,
            status_report_template_id: NO_TEMPLATE,
        }
    }
}

impl StatusVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag_bytes(&self) -> [u8; 5] {
        [
            self.flags1.bits(),
            self.flags2.bits(),
            self.flags3.bits(),
            self.flags4.bits(),
            self.flags5.bits(),
        ]
    }

    pub fn status_report_template_id(&self) -> u8 {
        self.status_report_template_id
    }

    pub fn last_template_id(&self) -> u8 {
        self.last_template_id
    }

    /// Advances the reported template id. Called exactly once per completed
    /// print job, at the BusyValDone -> IdleNotTOF transition.
    pub fn publish_completed_template(&mut self, template_id: u8) {
        self.last_template_id = template_id;
        self.status_report_template_id = template_id;
    }

    pub fn busy(&self) -> bool {
        self.flags1.contains(Flags1::BUSY)
    }

    pub fn set_busy(&mut self, value: bool) {
        self.flags1.set(Flags1::BUSY, value);
    }

    pub fn at_top_of_form(&self) -> bool {
        self.flags5.contains(Flags5::AT_TOP_OF_FORM)
    }

    pub fn set_at_top_of_form(&mut self, value: bool) {
        self.flags5.set(Flags5::AT_TOP_OF_FORM, value);
    }

    pub fn validation_done(&self) -> bool {
        self.flags5.contains(Flags5::VALIDATION_DONE)
    }

    pub fn set_validation_done(&mut self, value: bool) {
        self.flags5.set(Flags5::VALIDATION_DONE, value);
    }

    /// The only bit C5 is permitted to write.
    pub fn paper_in_chute(&self) -> bool {
        self.flags3.contains(Flags3::PAPER_IN_CHUTE)
    }

    pub fn set_paper_in_chute(&mut self, value: bool) {
        self.flags3.set(Flags3::PAPER_IN_CHUTE, value);
    }

    /// True as long as every flag byte's unmask bit is set. Used by tests
    /// to assert the invariant holds after arbitrary sequences of edits.
    pub fn unmask_bits_intact(&self) -> bool {
        self.flags1.contains(Flags1::UNMASK)
            && self.flags2.contains(Flags2::UNMASK)
            && self.flags3.contains(Flags3::UNMASK)
            && self.flags4.contains(Flags4::UNMASK)
            && self.flags5.contains(Flags5::UNMASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_up_defaults_match_spec() {
        let sv = StatusVector::default();
        assert_eq!(sv.flag_bytes(), [0x40, 0x40, 0x40, 0x40, 0x61]);
        assert_eq!(sv.status_report_template_id(), NO_TEMPLATE);
        assert_eq!(sv.last_template_id(), NO_TEMPLATE);
        assert!(!sv.at_top_of_form());
        assert!(sv.validation_done());
    }

    #[test]
    fn unmask_bit_survives_every_setter() {
        let mut sv = StatusVector::default();
        sv.set_busy(true);
        sv.set_at_top_of_form(true);
        sv.set_validation_done(false);
        sv.set_paper_in_chute(true);
        sv.set_busy(false);
        sv.set_paper_in_chute(false);
        assert!(sv.unmask_bits_intact());
    }

    #[test]
    fn busy_bit_is_flags1_bit5() {
        let mut sv = StatusVector::default();
        sv.set_busy(true);
        assert_eq!(sv.flag_bytes()[0], 0x60);
    }

    #[test]
    fn paper_in_chute_is_flags3_bit3() {
        let mut sv = StatusVector::default();
        sv.set_paper_in_chute(true);
        assert_eq!(sv.flag_bytes()[2], 0x48);
    }

    #[test]
    fn publish_completed_template_sets_both_ids() {
        let mut sv = StatusVector::default();
        sv.publish_completed_template(b'X');
        assert_eq!(sv.last_template_id(), b'X');
        assert_eq!(sv.status_report_template_id(), b'X');
    }

    #[test]
    fn validation_done_toggle_matches_flags5_bit5() {
        let mut sv = StatusVector::default();
        sv.set_validation_done(false);
        assert_eq!(sv.flag_bytes()[4], 0x41);
        sv.set_validation_done(true);
        assert_eq!(sv.flag_bytes()[4], 0x61);
    }
}
