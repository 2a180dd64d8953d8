#[cfg(test)]
mod tests {
    use crate::*;

    const MINIMAL: &str = r#"(
        keypads: [(name: "kp1", source: Serial(port: "/dev/ttyUSB0"))],
        targets: [(target: Obs(port: 4455, password: "secret"))],
        bindings: [(
            bindings: [
                (keys: ["A", "kp1.B"], commands: [(command: "obs.start_streaming")]),
                (keys: ["C"], commands: [(command: "obs.set_scene", params: ["Scene 2"])]),
            ],
        )],
    )"#;

    #[test]
    fn minimal_config_applies_defaults() {
        let cfg = load_from_str(MINIMAL).unwrap();

        let kp = &cfg.keypads[0];
        assert_eq!(kp.effective_name(), "kp1");
        let SourceKind::Serial(serial) = &kp.source;
        assert_eq!(serial.baud_rate, 9600);
        assert_eq!(serial.parity, "N");
        assert_eq!(serial.stop_bits, 1);
        assert_eq!(serial.size, 8);

        let target = &cfg.targets[0];
        assert_eq!(target.effective_name(), "obs");
        match &target.target {
            TargetKind::Obs(obs) => {
                assert_eq!(obs.host, "localhost");
                assert_eq!(obs.port, 4455);
                assert_eq!(obs.password.as_deref(), Some("secret"));
                assert_eq!(obs.retry_ms, 1000);
                assert!(!obs.fail_when_disconnected);
            }
            other => panic!("unexpected target {other:?}"),
        }

        assert_eq!(cfg.bindings[0].effective_name(), DEFAULT_BINDING_SET);
        assert_eq!(cfg.dispatch.max_inflight, 64);
        let set_scene = &cfg.bindings[0].bindings[1].commands[0];
        assert_eq!(set_scene.split(), Some(("obs", "set_scene")));
        assert_eq!(set_scene.params, vec![Value::from("Scene 2")]);
    }

    #[test]
    fn empty_sections_fail_validation() {
        let ron = r#"(keypads: [], targets: [], bindings: [])"#;
        let err = load_from_str(ron).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn reserved_target_name_rejected() {
        let ron = MINIMAL.replace(
            "(target: Obs(",
            "(name: \"bindings\", target: Obs(",
        );
        let err = load_from_str(&ron).unwrap_err();
        assert!(err.to_string().contains("reserved"), "{err}");
    }

    #[test]
    fn duplicate_set_names_rejected() {
        let ron = r#"(
            keypads: [(source: Serial(port: "/dev/null"))],
            targets: [(target: Keyboard(program: "xdotool"))],
            bindings: [
                (name: "main", bindings: [(keys: ["A"], commands: [(command: "keyboard.keypress", params: ["A"])])]),
                (name: "main", bindings: [(keys: ["B"], commands: [(command: "keyboard.keypress", params: ["B"])])]),
            ],
        )"#;
        let err = load_from_str(ron).unwrap_err();
        assert!(err.to_string().contains("duplicate binding set"), "{err}");
    }

    #[test]
    fn command_without_target_rejected() {
        let ron = MINIMAL.replace("obs.start_streaming", "start_streaming");
        let err = load_from_str(&ron).unwrap_err();
        assert!(err.to_string().contains("target.command"), "{err}");
    }

    #[test]
    fn binding_without_keys_rejected() {
        let ron = MINIMAL.replace(r#"keys: ["C"]"#, "keys: []");
        let err = load_from_str(&ron).unwrap_err();
        assert!(err.to_string().contains("has no keys"), "{err}");
    }

    #[test]
    fn syntax_error_reports_location() {
        let ron = "(\n  keypads: [\n  targets: ,\n)";
        match load_from_str(ron).unwrap_err() {
            Error::Parse {
                line, excerpt, message, ..
            } => {
                assert!(line >= 1);
                assert!(!message.is_empty());
                assert!(excerpt.contains('^'));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
