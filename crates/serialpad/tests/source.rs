use std::{env, fs, path::PathBuf, process, time::Duration};

use config::SerialConfig;
use keypad_engine::{Error, Event, EventSource};
use serialpad::SerialKeypad;
use tokio::{sync::mpsc, time::timeout};

fn scratch(name: &str, bytes: &[u8]) -> PathBuf {
    let path = env::temp_dir().join(format!("serialpad-{}-{name}", process::id()));
    fs::write(&path, bytes).unwrap();
    path
}

fn cfg(path: &PathBuf) -> SerialConfig {
    SerialConfig {
        port: path.display().to_string(),
        ..SerialConfig::default()
    }
}

#[tokio::test]
async fn emits_one_event_per_byte_then_ends() {
    let path = scratch("bytes", b"12A ");
    let mut pad = SerialKeypad::open("kp1", &cfg(&path)).unwrap();
    assert_eq!(pad.name(), "kp1");

    let (tx, mut rx) = mpsc::channel(8);
    pad.start(tx).await.unwrap();

    let mut got = Vec::new();
    while let Some(ev) = timeout(Duration::from_secs(5), rx.recv()).await.unwrap() {
        got.push(ev);
    }
    assert_eq!(
        got,
        vec![
            Event::new("kp1", "1"),
            Event::new("kp1", "2"),
            Event::new("kp1", "A"),
            Event::new("kp1", " "),
        ]
    );

    pad.close().await;
    pad.close().await;
    fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn start_twice_is_an_error() {
    let path = scratch("twice", b"");
    let mut pad = SerialKeypad::open("kp", &cfg(&path)).unwrap();
    let (tx, _rx) = mpsc::channel(1);
    pad.start(tx.clone()).await.unwrap();
    assert!(pad.start(tx).await.is_err());
    pad.close().await;
    fs::remove_file(path).unwrap();
}

#[test]
fn open_requires_a_port() {
    let err = SerialKeypad::open("kp", &SerialConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("no serial port"), "{err}");
}

#[test]
fn open_reports_missing_device() {
    let cfg = SerialConfig {
        port: "/nonexistent/ttyUSB9".into(),
        ..SerialConfig::default()
    };
    match SerialKeypad::open("kp", &cfg) {
        Err(Error::Io(e)) => assert!(e.to_string().contains("/nonexistent/ttyUSB9")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn open_rejects_bad_line_settings() {
    let path = scratch("parity", b"");
    let bad = SerialConfig {
        parity: "X".into(),
        ..cfg(&path)
    };
    assert!(matches!(
        SerialKeypad::open("kp", &bad),
        Err(Error::Config(_))
    ));
    fs::remove_file(path).unwrap();
}
