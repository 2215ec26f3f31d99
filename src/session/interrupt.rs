//! Interruption bookkeeping
//!
//! Every decision request gets a generation number and a cancel token. A
//! result is trusted only if it carries the generation of the request that is
//! still in flight. Cancelling through the controller takes the request out
//! of flight, so its result is stale and gets dropped, whichever of "result
//! arrives" and "cancel" won the race. The token itself may also fire from
//! the provider side (a timeout); that does not make the result stale.

use crate::agents::CancelToken;

#[derive(Debug)]
struct InFlight {
    generation: u64,
    token: CancelToken,
}

#[derive(Debug, Default)]
pub struct InterruptionController {
    generation: u64,
    in_flight: Option<InFlight>,
    restart: bool,
}

impl InterruptionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new decision request. Any request still in flight is cancelled.
    pub fn begin(&mut self) -> (u64, CancelToken) {
        if let Some(previous) = self.in_flight.take() {
            previous.token.cancel();
        }
        self.generation += 1;
        let token = CancelToken::new();
        self.in_flight = Some(InFlight {
            generation: self.generation,
            token: token.clone(),
        });
        (self.generation, token)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancel the request with this generation. Returns false if it was not
    /// in flight (already finished, already cancelled, or superseded).
    pub fn cancel(&mut self, generation: u64) -> bool {
        match &self.in_flight {
            Some(f) if f.generation == generation => {
                f.token.cancel();
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }

    /// Claim a result. True exactly once for the request still in flight.
    pub fn accept(&mut self, generation: u64) -> bool {
        match &self.in_flight {
            Some(f) if f.generation == generation => {
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.generation)
    }

    /// The interrupted participant must replay its turn
    pub fn request_restart(&mut self) {
        self.restart = true;
    }

    pub fn restart_pending(&self) -> bool {
        self.restart
    }

    pub fn take_restart(&mut self) -> bool {
        std::mem::take(&mut self.restart)
    }
}
