use super::can::{Can, CanBitrate, CanConfig, CanOptions};
use super::mock::{channel_pair, MockPort, MockTransport};
use super::CanTransport;
use crate::error::Error;
use crate::types::{Config, Frame};
use std::time::Duration;

const WAIT: Duration = Duration::from_millis(50);

#[test]
fn test_can_requires_open() {
    let mut can = Can::with_port(CanConfig::default(), MockPort::default());
    assert!(matches!(
        can.send_frame(&Frame::new(0x7E0, &[0x01])),
        Err(Error::NotOpen)
    ));
    assert!(matches!(
        can.receive_matching(0x7E8, WAIT),
        Err(Error::NotOpen)
    ));

    can.open().unwrap();
    assert!(can.is_open());
    can.send_frame(&Frame::new(0x7E0, &[0x01])).unwrap();
    assert_eq!(can.port().sent.len(), 1);
    assert_eq!(can.tx_count(), 1);

    can.close().unwrap();
    assert!(!can.is_open());
}

#[test]
fn test_can_filters_by_identifier() {
    let port = MockPort::new([
        Frame::new(0x100, &[0xAA]),
        Frame::new(0x7E9, &[0xBB]),
        Frame::new(0x7E8, &[0xCC]),
        Frame::new(0x7E8, &[0xDD]),
    ]);
    let mut can = Can::with_bitrate(port, CanBitrate::Rate500K, CanOptions::NONE);
    can.open().unwrap();

    assert_eq!(can.receive_matching(0x7E8, WAIT).unwrap().data, vec![0xCC]);
    assert_eq!(can.receive_matching(0x7E8, WAIT).unwrap().data, vec![0xDD]);
    assert!(matches!(
        can.receive_matching(0x7E8, WAIT),
        Err(Error::Timeout)
    ));
    assert_eq!(can.rx_count(), 2);
    assert_eq!(can.filtered_count(), 2);
}

#[test]
fn test_can_rejects_invalid_frames() {
    let mut can = Can::with_port(CanConfig::default(), MockPort::default());
    can.open().unwrap();

    let oversized = Frame::new(0x7E0, &[0; 9]);
    assert!(matches!(
        can.send_frame(&oversized),
        Err(Error::MalformedFrame(_))
    ));

    let bad_id = Frame::new(0x800, &[0x01]);
    assert!(matches!(can.send_frame(&bad_id), Err(Error::MalformedFrame(_))));

    let extended = Frame::extended(0x18DA_F110, &[0x01]);
    can.send_frame(&extended).unwrap();
    assert!(can.into_port().sent[0].is_extended);
}

#[test]
fn test_can_listen_only() {
    let mut can = Can::with_bitrate(
        MockPort::default(),
        CanBitrate::Custom(83_333),
        CanOptions::LISTEN_ONLY,
    );
    can.open().unwrap();
    assert_eq!(can.config().bitrate, 83_333);
    assert!(matches!(
        can.send_frame(&Frame::new(0x7E0, &[0x01])),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_can_config_validation() {
    let config = CanConfig {
        bitrate: 0,
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = CanConfig {
        options: CanOptions::LISTEN_ONLY | CanOptions::ONE_SHOT,
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let mut can = Can::with_port(config, MockPort::default());
    assert!(matches!(can.open(), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_mock_transport_responder() {
    let mut mock = MockTransport::with_responder(|frame| vec![Frame::new(0x7E8, &frame.data)]);
    mock.send_frame(&Frame::new(0x7E0, &[0x01, 0x3E])).unwrap();

    assert_eq!(mock.sent().len(), 1);
    assert_eq!(mock.pending(), 1);
    assert!(matches!(
        mock.receive_matching(0x7E9, WAIT),
        Err(Error::Timeout)
    ));
    assert_eq!(mock.receive_matching(0x7E8, WAIT).unwrap().data, vec![0x01, 0x3E]);
}

#[test]
fn test_mock_transport_error() {
    let mut mock = MockTransport::new_error();
    let err = mock.send_frame(&Frame::new(0x7E0, &[0x01])).unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(err.is_transient());
}

#[test]
fn test_channel_pair() {
    let (mut a, mut b) = channel_pair();
    a.send_frame(&Frame::new(0x123, &[1])).unwrap();
    a.send_frame(&Frame::new(0x456, &[2])).unwrap();

    assert_eq!(b.receive_matching(0x456, WAIT).unwrap().data, vec![2]);
    assert!(matches!(b.receive_matching(0x123, WAIT), Err(Error::Timeout)));

    drop(a);
    assert!(matches!(
        b.receive_matching(0x123, WAIT),
        Err(Error::Transport(_))
    ));
}

#[test]
fn test_mock_transport_set_responder() {
    let mut mock = MockTransport::new();
    mock.send_frame(&Frame::new(0x7E0, &[0x01, 0x3E])).unwrap();
    assert_eq!(mock.pending(), 0);

    mock.set_responder(Some(Box::new(|frame: &Frame| {
        vec![Frame::new(0x7E8, &[0x01, frame.data[1] + 0x40])]
    })));
    mock.send_frame(&Frame::new(0x7E0, &[0x01, 0x3E])).unwrap();
    assert_eq!(mock.receive_matching(0x7E8, WAIT).unwrap().data, vec![0x01, 0x7E]);

    mock.set_responder(None);
    mock.send_frame(&Frame::new(0x7E0, &[0x01, 0x3E])).unwrap();
    assert_eq!(mock.pending(), 0);

    let sent = mock.take_sent();
    assert_eq!(sent.len(), 3);
    assert!(mock.sent().is_empty());
}

#[test]
fn test_transport_through_box_and_reference() {
    let mut mock = MockTransport::new();
    mock.push_incoming(Frame::new(0x7E8, &[0x01, 0x7F]));
    {
        let mut borrowed: &mut MockTransport = &mut mock;
        CanTransport::send_frame(&mut borrowed, &Frame::new(0x7E0, &[0x01, 0x10])).unwrap();
        let frame = CanTransport::receive_matching(&mut borrowed, 0x7E8, WAIT).unwrap();
        assert_eq!(frame.data, vec![0x01, 0x7F]);
    }
    assert_eq!(mock.sent().len(), 1);

    let mut boxed: Box<dyn CanTransport> = Box::new(mock);
    boxed.send_frame(&Frame::new(0x7E0, &[0x01, 0x20])).unwrap();
    assert!(matches!(
        boxed.receive_matching(0x7E8, WAIT),
        Err(Error::Timeout)
    ));
}
