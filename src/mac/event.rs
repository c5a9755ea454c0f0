//! Events produced while negotiating MAC commands.
//!
//! Events are plain values. The host publishes them once the mutated device is committed,
//! so a discarded transaction leaks nothing.

use alloc::string::String;
use alloc::vec::Vec;

use crate::mac::command::{Cid, MacCommand};
use crate::mac::types::DeviceClass;
use crate::Error;

/// Observable outcome of MAC processing, published by the host.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Event {
    /// A request was added to the next downlink.
    RequestEnqueued(MacCommand),
    /// An answer or confirmation was added to the next downlink.
    AnswerEnqueued(MacCommand),
    /// An answer arrived that carries no accept or reject semantics.
    AnswerReceived(MacCommand),
    AnswerAccepted { request: MacCommand, answer: MacCommand },
    AnswerRejected { request: MacCommand, answer: MacCommand },
    /// A device-initiated command arrived.
    IndicationReceived(MacCommand),
    GenerationFailed { cid: Cid, error: Error },
    HandleFailed { cid: Cid, error: Error },
    ClassSwitched { from: DeviceClass, to: DeviceClass },
}

impl Event {
    /// Stable dotted name, such as `ns.mac.link_adr.answer.accept`.
    pub fn name(&self) -> String {
        let (cid, suffix) = match self {
            Event::RequestEnqueued(cmd) => (cmd.cid(), "request"),
            Event::AnswerEnqueued(cmd) => (cmd.cid(), "answer"),
            Event::AnswerReceived(cmd) => (cmd.cid(), "answer"),
            Event::AnswerAccepted { answer, .. } => (answer.cid(), "answer.accept"),
            Event::AnswerRejected { answer, .. } => (answer.cid(), "answer.reject"),
            Event::IndicationReceived(cmd) => (cmd.cid(), "indication"),
            Event::GenerationFailed { cid, .. } => (*cid, "generation.fail"),
            Event::HandleFailed { cid, .. } => (*cid, "handle.fail"),
            Event::ClassSwitched { to, .. } => {
                let class = match to {
                    DeviceClass::A => "a",
                    DeviceClass::B => "b",
                    DeviceClass::C => "c",
                };
                return alloc::format!("ns.class.switch.{}", class);
            }
        };
        alloc::format!("ns.mac.{}.{}", cid.name(), suffix)
    }
}

/// Receiver of committed events, implemented by the host's event bus.
pub trait EventSink {
    /// Publishes a batch in order.
    fn publish(&mut self, events: Vec<Event>);
}

impl EventSink for Vec<Event> {
    fn publish(&mut self, events: Vec<Event>) {
        self.extend(events);
    }
}
