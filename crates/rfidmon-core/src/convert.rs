// ── Wire → domain conversion ──
//
// The transport hands over validated frames with an arrival stamp; this is
// where raw state strings become `SensorState`s.

use rfidmon_api::{ReceivedFrame, SensorFrame};

use crate::model::SensorEvent;

impl From<&ReceivedFrame> for SensorEvent {
    fn from(received: &ReceivedFrame) -> Self {
        let SensorFrame {
            state,
            message,
            countdown,
            uid_status,
        } = received.frame.clone();

        Self {
            state: state.into(),
            message,
            countdown,
            uid_status,
            received_at: received.received_at,
        }
    }
}

impl From<ReceivedFrame> for SensorEvent {
    fn from(received: ReceivedFrame) -> Self {
        Self::from(&received)
    }
}
