//! Downlink packing and matching of answers to pending requests.

use alloc::vec::Vec;

use crate::mac::command::{Cid, MacCommand};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::Error;

/// Outcome of an enqueue step.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueState {
    /// Downlink bytes left for the following commands.
    pub max_down_len: u16,
    /// Uplink answer bytes left for the following commands.
    pub max_up_len: u16,
    /// Events of the commands enqueued or failed in this step.
    pub queued_events: Vec<Event>,
    /// Every command the step wanted to send did fit.
    pub ok: bool,
}

impl EnqueueState {
    /// Nothing to enqueue: budgets are left untouched.
    pub fn unchanged(max_down_len: u16, max_up_len: u16) -> Self {
        Self { max_down_len, max_up_len, queued_events: Vec::new(), ok: true }
    }
}

/// Produces commands of kind `cid` within the given byte budgets.
///
/// `f` receives the number of commands the downlink budget admits and the number of answers
/// the uplink budget admits, and returns the commands, the number of answers they cost, the
/// events to emit and whether everything needed did fit. The caller appends the commands to
/// the pending requests.
///
/// # Panics
///
/// If `f` returns more commands or answers than it was allowed.
pub fn enqueue_mac_command<F>(
    cid: Cid,
    max_down_len: u16,
    max_up_len: u16,
    f: F,
) -> (Vec<MacCommand>, EnqueueState)
where
    F: FnOnce(u16, u16) -> (Vec<MacCommand>, u16, Vec<Event>, bool),
{
    let descriptor = cid.descriptor();
    let down_width = 1 + descriptor.downlink_length;
    let up_width = 1 + descriptor.uplink_length;
    let max_down = max_down_len / down_width;
    let max_up = if descriptor.expect_answer { max_up_len / up_width } else { u16::MAX };

    let (cmds, up_consumed, queued_events, ok) = f(max_down, max_up);
    assert!(
        cmds.len() <= usize::from(max_down),
        "{} commands of {:?} exceed the downlink budget of {}",
        cmds.len(),
        cid,
        max_down
    );
    assert!(
        up_consumed <= max_up,
        "{} answers to {:?} exceed the uplink budget of {}",
        up_consumed,
        cid,
        max_up
    );

    let max_down_len = max_down_len - cmds.len() as u16 * down_width;
    let max_up_len = if descriptor.expect_answer {
        max_up_len - up_consumed * up_width
    } else {
        max_up_len
    };
    trace!("enqueued {} commands, {} bytes down and {} bytes up left", cmds.len(), max_down_len, max_up_len);
    (cmds, EnqueueState { max_down_len, max_up_len, queued_events, ok })
}

/// Takes the first pending request with identifier `cid` out and applies `f` to it.
/// On failure the request is put back where it was.
pub fn handle_mac_response<F>(
    dev: &mut EndDevice,
    cid: Cid,
    allow_missing: bool,
    mut f: F,
) -> Result<(), Error>
where
    F: FnMut(&mut EndDevice, &MacCommand) -> Result<(), Error>,
{
    let state = dev.mac_state_mut()?;
    let Some(index) = state.pending_requests.iter().position(|cmd| cmd.cid() == cid) else {
        if allow_missing {
            return Ok(());
        }
        warn!("no pending request for answer {}", cid as u8);
        return Err(Error::RequestNotFound { cid });
    };
    let request = state.pending_requests.remove(index);
    let result = f(dev, &request);
    if result.is_err() {
        if let Some(state) = dev.mac_state.as_mut() {
            let index = index.min(state.pending_requests.len());
            state.pending_requests.insert(index, request);
        }
    }
    result
}

/// Takes the first contiguous run of pending requests with identifier `cid` out and applies
/// `f` to each of them in order. On failure the whole run is put back.
pub fn handle_mac_response_block<F>(
    dev: &mut EndDevice,
    cid: Cid,
    allow_missing: bool,
    mut f: F,
) -> Result<(), Error>
where
    F: FnMut(&mut EndDevice, &MacCommand) -> Result<(), Error>,
{
    let state = dev.mac_state_mut()?;
    let Some(start) = state.pending_requests.iter().position(|cmd| cmd.cid() == cid) else {
        if allow_missing {
            return Ok(());
        }
        warn!("no pending request block for answer {}", cid as u8);
        return Err(Error::RequestNotFound { cid });
    };
    let end = state.pending_requests[start..]
        .iter()
        .position(|cmd| cmd.cid() != cid)
        .map_or(state.pending_requests.len(), |len| start + len);
    let block: Vec<MacCommand> = state.pending_requests.drain(start..end).collect();

    let result = block.iter().try_for_each(|request| f(dev, request));
    if result.is_err() {
        if let Some(state) = dev.mac_state.as_mut() {
            let start = start.min(state.pending_requests.len());
            state.pending_requests.splice(start..start, block);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::command::{DutyCycleReq, RxTimingSetupReq};
    use crate::mac::device::MacState;
    use crate::mac::types::{DeviceClass, MacVersion};
    use alloc::vec;

    fn device(pending: Vec<MacCommand>) -> EndDevice {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", MacVersion::V1_0_3);
        let mut state =
            MacState::new(MacVersion::V1_0_3, DeviceClass::A, Default::default(), Default::default());
        state.pending_requests = pending;
        dev.mac_state = Some(state);
        dev
    }

    fn duty_cycle(max_duty_cycle: u8) -> MacCommand {
        MacCommand::DutyCycleReq(DutyCycleReq { max_duty_cycle })
    }

    #[test]
    fn budgets_are_debited_per_command() {
        let (cmds, state) = enqueue_mac_command(Cid::NewChannel, 15, 5, |n_down, n_up| {
            assert_eq!((n_down, n_up), (2, 2));
            (vec![MacCommand::DevStatusReq; 2], 2, Vec::new(), true)
        });
        assert_eq!(cmds.len(), 2);
        assert_eq!((state.max_down_len, state.max_up_len), (3, 1));
    }

    #[test]
    fn unanswered_commands_leave_uplink_budget() {
        let (_, state) = enqueue_mac_command(Cid::ForceRejoin, 3, 4, |n_down, n_up| {
            assert_eq!((n_down, n_up), (1, u16::MAX));
            (vec![MacCommand::DevStatusReq], 0, Vec::new(), true)
        });
        assert_eq!((state.max_down_len, state.max_up_len), (0, 4));
    }

    #[test]
    #[should_panic]
    fn over_production_panics() {
        enqueue_mac_command(Cid::DutyCycle, 3, 10, |_, _| {
            (vec![duty_cycle(1), duty_cycle(2)], 2, Vec::new(), true)
        });
    }

    #[test]
    fn single_match_restores_on_error() {
        let timing = MacCommand::RxTimingSetupReq(RxTimingSetupReq { delay: 3 });
        let mut dev = device(vec![duty_cycle(1), timing.clone(), duty_cycle(2)]);
        let result = handle_mac_response(&mut dev, Cid::DutyCycle, false, |_, _| {
            Err(Error::CorruptedMacState("test"))
        });
        assert!(result.is_err());
        assert_eq!(dev.mac_state().unwrap().pending_requests[0], duty_cycle(1));

        handle_mac_response(&mut dev, Cid::DutyCycle, false, |_, req| {
            assert_eq!(req, &duty_cycle(1));
            Ok(())
        })
        .unwrap();
        assert_eq!(dev.mac_state().unwrap().pending_requests, vec![timing, duty_cycle(2)]);
    }

    #[test]
    fn missing_request() {
        let mut dev = device(Vec::new());
        assert_eq!(
            handle_mac_response(&mut dev, Cid::DutyCycle, false, |_, _| Ok(())),
            Err(Error::RequestNotFound { cid: Cid::DutyCycle })
        );
        assert_eq!(handle_mac_response(&mut dev, Cid::DutyCycle, true, |_, _| Ok(())), Ok(()));
    }

    #[test]
    fn block_match_takes_contiguous_run() {
        let timing = MacCommand::RxTimingSetupReq(RxTimingSetupReq { delay: 3 });
        let mut dev = device(vec![
            timing.clone(),
            duty_cycle(1),
            duty_cycle(2),
            timing.clone(),
            duty_cycle(3),
        ]);
        let mut seen = Vec::new();
        handle_mac_response_block(&mut dev, Cid::DutyCycle, false, |_, req| {
            seen.push(req.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![duty_cycle(1), duty_cycle(2)]);
        assert_eq!(
            dev.mac_state().unwrap().pending_requests,
            vec![timing.clone(), timing, duty_cycle(3)]
        );
    }
}
