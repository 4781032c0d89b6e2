use pc4_protocol::{classify, Frame, Framer};
use pc4_status::StatusVector;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::wire::build_status_frame;

/// The four-state print-job lifecycle. `IdleTOF` is both the initial and
/// terminal state; see the acceptance-gap note on `timer_pending` below for
/// why `state == IdleTOF` does not by itself mean "no timer outstanding".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintJobState {
    IdleTOF,
    BusyNotTOF,
    BusyValDone,
    IdleNotTOF,
}

/// Work produced while holding the state mutex but only safe to perform
/// after releasing it: sending a frame (suspends on the transport) or
/// spawning a timer task (needs an `Arc` back to the engine).
#[derive(Debug)]
pub enum Action {
    Send(Vec<u8>),
    ArmJobTimer { delay_ms: u64, gen: u64 },
    ArmChuteSetTimer { delay_ms: u64, gen: u64 },
    ArmChuteClearTimer { delay_ms: u64, gen: u64 },
}

/// Everything that must change atomically: the status vector, the frame
/// reassembler, the print-job and paper-chute lifecycle state, and the
/// generation counters that let a superseded timer recognize itself as
/// stale when it eventually fires.
pub struct EngineState {
    pub status: StatusVector,
    pub framer: Framer,
    pub job_state: PrintJobState,
    /// True from the moment a print command is accepted until T4 returns
    /// the machine to true idle. A C4 timer is outstanding for the whole
    /// span this flag is true, including the acceptance gap between T0 and
    /// T1 where `job_state` still reads `IdleTOF`.
    pub timer_pending: bool,
    pub last_print_template_id: u8,
    pub job_gen: u64,
    pub chute_gen: u64,
    pub running: bool,
}

impl EngineState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            status: StatusVector::new(),
            framer: Framer::new(
                config.min_message_size,
                config.max_message_size,
                config.reassembly_timeout,
            ),
            job_state: PrintJobState::IdleTOF,
            timer_pending: false,
            last_print_template_id: pc4_status::NO_TEMPLATE,
            job_gen: 0,
            chute_gen: 0,
            running: false,
        }
    }

    pub fn build_status_frame(&self, config: &EngineConfig) -> Vec<u8> {
        build_status_frame(
            config,
            self.status.flag_bytes(),
            self.status.status_report_template_id(),
        )
    }

    /// Dispatch one complete, already-reassembled frame.
    pub fn handle_frame(&mut self, frame: &[u8], config: &EngineConfig) -> Vec<Action> {
        match classify(frame) {
            Ok(Frame::StatusRequest) | Ok(Frame::ExtendedStatusRequest) => {
                vec![Action::Send(self.build_status_frame(config))]
            }
            Ok(Frame::ClearErrorFlags) => {
                debug!(target: "dispatcher", "clear_error_flags is a no-op in this core");
                vec![]
            }
            Ok(Frame::PrintTemplate(cmd)) => self.try_accept_print(cmd.template_id, config),
            Err(err) => {
                warn!(target: "dispatcher", %err, "frame parse rejected");
                vec![]
            }
        }
    }

    /// §4.3: rejected if the state is not `IdleTOF` or a timer is already
    /// pending (the acceptance gap between T0 and T1).
    fn try_accept_print(&mut self, template_id: u8, config: &EngineConfig) -> Vec<Action> {
        if self.job_state != PrintJobState::IdleTOF || self.timer_pending {
            warn!(target: "print_job", "print command dropped, job not idle");
            return vec![];
        }
        self.last_print_template_id = template_id;
        self.timer_pending = true;
        self.job_gen += 1;
        vec![Action::ArmJobTimer {
            delay_ms: config.print_start_delay.as_millis() as u64,
            gen: self.job_gen,
        }]
    }

    /// A C4 timer fired. Which transition applies depends on the state the
    /// timer was armed for; a stale generation or a stopped engine is a
    /// silent no-op.
    pub fn fire_job_timer(&mut self, gen: u64, config: &EngineConfig) -> Vec<Action> {
        if !self.running || self.job_gen != gen {
            return vec![];
        }
        match self.job_state {
            PrintJobState::IdleTOF => self.transition_t1(config),
            PrintJobState::BusyNotTOF => self.transition_t2(config),
            PrintJobState::BusyValDone => self.transition_t3(config),
            PrintJobState::IdleNotTOF => self.transition_t4(),
        }
    }

    fn transition_t1(&mut self, config: &EngineConfig) -> Vec<Action> {
        self.job_state = PrintJobState::BusyNotTOF;
        self.status.set_busy(true);
        self.status.set_validation_done(false);
        self.status.set_at_top_of_form(false);
        vec![Action::ArmJobTimer {
            delay_ms: config.validation_delay.as_millis() as u64,
            gen: self.job_gen,
        }]
    }

    fn transition_t2(&mut self, config: &EngineConfig) -> Vec<Action> {
        self.job_state = PrintJobState::BusyValDone;
        self.status.set_validation_done(true);
        self.chute_gen += 1;
        vec![
            Action::ArmJobTimer {
                delay_ms: config.busy_state_change_delay.as_millis() as u64,
                gen: self.job_gen,
            },
            Action::ArmChuteSetTimer {
                delay_ms: config.paper_in_chute_set_delay.as_millis() as u64,
                gen: self.chute_gen,
            },
        ]
    }

    /// `ValidationDone` is untouched here: the invariant in force is "set
    /// only by entering BusyValDone, cleared only by entering BusyNotTOF",
    /// so it stays 1 through T3 and T4 and is only cleared by the next
    /// job's T1.
    fn transition_t3(&mut self, config: &EngineConfig) -> Vec<Action> {
        self.job_state = PrintJobState::IdleNotTOF;
        self.status.set_busy(false);
        self.status.publish_completed_template(self.last_print_template_id);
        vec![Action::ArmJobTimer {
            delay_ms: config.tof_state_change_delay.as_millis() as u64,
            gen: self.job_gen,
        }]
    }

    fn transition_t4(&mut self) -> Vec<Action> {
        self.job_state = PrintJobState::IdleTOF;
        self.timer_pending = false;
        self.status.set_at_top_of_form(true);
        vec![]
    }

    pub fn fire_chute_set(&mut self, gen: u64, config: &EngineConfig) -> Vec<Action> {
        if !self.running || self.chute_gen != gen {
            return vec![];
        }
        self.status.set_paper_in_chute(true);
        vec![Action::ArmChuteClearTimer {
            delay_ms: config.paper_in_chute_clear_delay.as_millis() as u64,
            gen,
        }]
    }

    pub fn fire_chute_clear(&mut self, gen: u64) -> Vec<Action> {
        if !self.running || self.chute_gen != gen {
            return vec![];
        }
        self.status.set_paper_in_chute(false);
        vec![]
    }
}
