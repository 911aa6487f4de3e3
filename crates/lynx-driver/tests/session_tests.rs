//! 会话级集成测试（基于 testkit 模拟控制器）

use lynx_driver::testkit::{MockController, MockControllerConfig};
use lynx_driver::{DriverError, ProtocolEngine, Session, SessionConfig, recipes};
use lynx_protocol::names::default_output_variables;
use lynx_protocol::{CommandPayload, RobotCommand};
use lynx_transport::mock::mock_link;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    pred()
}

fn connect_pair(cfg: MockControllerConfig) -> (Arc<Session>, MockController) {
    let (transport, listener) = mock_link();
    let controller = MockController::spawn(listener, cfg);
    let session = Session::connect(Arc::new(transport), SessionConfig::default())
        .expect("session should connect against mock controller");
    (session, controller)
}

#[test]
fn test_input_recipe_ids_strictly_increasing_not_deduplicated() {
    let (transport, listener) = mock_link();
    let _controller = MockController::spawn(listener, MockControllerConfig::default());

    let engine = ProtocolEngine::new(Arc::new(transport));
    engine.connect(Duration::from_secs(1)).unwrap();
    engine.negotiate_protocol_version().unwrap();
    engine.controller_version().unwrap();
    engine
        .send_output_setup(&default_output_variables(), 500.0)
        .unwrap();

    // 同一个变量列表注册两次：不去重，ID 严格递增
    let first = engine.send_input_setup(&recipes::no_command()).unwrap();
    let second = engine.send_input_setup(&recipes::no_command()).unwrap();
    let third = engine.send_input_setup(&recipes::control()).unwrap();
    assert!(first < second);
    assert!(second < third);
}

#[test]
fn test_start_pause_lifecycle() {
    let (transport, listener) = mock_link();
    let _controller = MockController::spawn(listener, MockControllerConfig::default());

    let engine = ProtocolEngine::new(Arc::new(transport));
    engine.connect(Duration::from_secs(1)).unwrap();
    engine.negotiate_protocol_version().unwrap();
    engine.controller_version().unwrap();
    engine
        .send_output_setup(&default_output_variables(), 500.0)
        .unwrap();
    let no_command = engine.send_input_setup(&recipes::no_command()).unwrap();

    // start 之前不允许 send
    let err = engine
        .send(&RobotCommand::new(no_command, CommandPayload::NoCommand))
        .unwrap_err();
    assert!(matches!(err, DriverError::NotStarted));

    engine.send_start().unwrap();
    assert!(matches!(
        engine.send_start().unwrap_err(),
        DriverError::AlreadyStarted
    ));

    // start 之后不允许再注册 recipe
    assert!(matches!(
        engine.send_input_setup(&recipes::no_command()).unwrap_err(),
        DriverError::SetupAfterStart
    ));

    engine
        .send(&RobotCommand::new(no_command, CommandPayload::NoCommand))
        .unwrap();

    engine.send_pause().unwrap();
    let err = engine
        .send(&RobotCommand::new(no_command, CommandPayload::NoCommand))
        .unwrap_err();
    assert!(matches!(err, DriverError::NotStarted));
}

#[test]
fn test_send_then_receive_keeps_layout_consistent() {
    let (session, controller) = connect_pair(MockControllerConfig::default());
    let ids = session.recipe_ids().unwrap();

    session
        .send(&RobotCommand::new(
            ids.standard_digital_out,
            CommandPayload::SetStandardDigitalOut {
                mask: 0b1000,
                level: 0b1000,
            },
        ))
        .unwrap();

    // 命令生效后经状态流回读：后续包不得出现布局解码错误
    assert!(wait_until(Duration::from_secs(1), || {
        session
            .snapshot()
            .bits64("actual_digital_output_bits")
            .map(|bits| bits & 0b1000 != 0)
            .unwrap_or(false)
    }));
    assert!(session.is_connected());
    assert!(session.take_rx_error().is_none());
    drop(controller);
}

#[test]
fn test_reconnect_is_idempotent() {
    let (session, controller) = connect_pair(MockControllerConfig::default());
    let ids_before = session.recipe_ids().unwrap();

    session.reconnect().unwrap();
    session.reconnect().unwrap();

    assert!(session.is_connected());
    // 重连按同样顺序重做注册，ID 表与上次一致
    assert_eq!(session.recipe_ids().unwrap(), ids_before);
    assert!(
        controller
            .shared
            .sessions
            .load(std::sync::atomic::Ordering::Relaxed)
            >= 3
    );
}

#[test]
fn test_watchdog_kick_while_disconnected_surfaces_error() {
    let (session, _controller) = connect_pair(MockControllerConfig::default());
    session.disconnect();

    let err = session.kick_watchdog().unwrap_err();
    assert!(matches!(err, DriverError::NotConnected));
}

#[test]
fn test_watchdog_enabled_exactly_once_and_kicks_counted() {
    let (session, controller) = connect_pair(MockControllerConfig::default());

    session.enable_watchdog(10.0).unwrap();
    let err = session.enable_watchdog(10.0).unwrap_err();
    assert!(matches!(err, DriverError::WatchdogAlreadyEnabled));

    for _ in 0..3 {
        session.kick_watchdog().unwrap();
    }
    assert!(wait_until(Duration::from_secs(1), || {
        controller
            .shared
            .watchdog_kicks
            .load(std::sync::atomic::Ordering::Relaxed)
            >= 3
    }));
    assert_eq!(*controller.shared.watchdog_hz.lock(), Some(10.0));
}

#[test]
fn test_receive_loop_terminates_on_forced_disconnect() {
    let (session, controller) = connect_pair(MockControllerConfig::default());
    assert!(session.is_connected());

    // 控制器整体消失：接收循环应在一个周期级的时间内自行终止
    controller.stop();
    assert!(wait_until(Duration::from_millis(500), || {
        !session.is_connected()
    }));
    assert!(session.take_rx_error().is_some());
}

#[test]
fn test_protocol_version_refused_is_fatal() {
    let (transport, listener) = mock_link();
    let _controller = MockController::spawn(
        listener,
        MockControllerConfig {
            accept_protocol: false,
            ..Default::default()
        },
    );

    let err = Session::connect(Arc::new(transport), SessionConfig::default()).unwrap_err();
    assert!(matches!(err, DriverError::VersionRefused { requested: 2 }));
}

#[test]
fn test_output_recipe_rejected_on_unknown_variable() {
    let (transport, listener) = mock_link();
    let _controller = MockController::spawn(listener, MockControllerConfig::default());

    let mut config = SessionConfig::default();
    config.output_variables.push("bogus_variable".to_string());

    let err = Session::connect(Arc::new(transport), config).unwrap_err();
    match err {
        DriverError::RecipeRejected { reason } => assert!(reason.contains("bogus_variable")),
        other => panic!("expected RecipeRejected, got {other}"),
    }
}

#[test]
fn test_unsupported_frequency_rejected_without_renegotiation() {
    let (transport, listener) = mock_link();
    // 新代固件（客户端只会尝试 500 Hz），但控制器只接受 125 Hz
    let _controller = MockController::spawn(
        listener,
        MockControllerConfig {
            accepted_frequencies: vec![125.0],
            ..Default::default()
        },
    );

    let err = Session::connect(Arc::new(transport), SessionConfig::default()).unwrap_err();
    match err {
        DriverError::RecipeRejected { reason } => assert!(reason.contains("frequency")),
        other => panic!("expected RecipeRejected, got {other}"),
    }
}

#[test]
fn test_send_reconnect_retry_is_bounded() {
    let (session, controller) = connect_pair(MockControllerConfig::default());
    let ids = session.recipe_ids().unwrap();
    let command = RobotCommand::new(
        ids.standard_digital_out,
        CommandPayload::SetStandardDigitalOut { mask: 1, level: 1 },
    );

    // 连接断开后发送：默认一次重连重试，命令最终送达
    session.disconnect();
    assert!(!session.is_connected());
    session.send(&command).unwrap();
    assert!(session.is_connected());

    // 重试次数为 0 时同样场景直接报 NotConnected
    let (transport, listener) = mock_link();
    let _controller2 = MockController::spawn(listener, MockControllerConfig::default());
    let session2 = Session::connect(
        Arc::new(transport),
        SessionConfig {
            send_retries: 0,
            ..Default::default()
        },
    )
    .unwrap();
    let ids2 = session2.recipe_ids().unwrap();
    session2.disconnect();
    let err = session2
        .send(&RobotCommand::new(
            ids2.no_command,
            CommandPayload::NoCommand,
        ))
        .unwrap_err();
    assert!(matches!(err, DriverError::NotConnected));
    drop(controller);
}

#[test]
fn test_async_progress_idle_before_any_async_command() {
    let (session, _controller) = connect_pair(MockControllerConfig::default());
    assert!(wait_until(Duration::from_secs(1), || {
        !session.snapshot().is_empty()
    }));
    assert_eq!(session.async_progress(), -1);
}

#[test]
fn test_send_with_unknown_recipe_id_fails_before_wire() {
    let (session, controller) = connect_pair(MockControllerConfig::default());
    let before = controller
        .shared
        .input_packages
        .load(std::sync::atomic::Ordering::Relaxed);

    let err = session
        .send(&RobotCommand::new(200, CommandPayload::NoCommand))
        .unwrap_err();
    assert!(matches!(err, DriverError::UnknownRecipe(200)));

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(
        controller
            .shared
            .input_packages
            .load(std::sync::atomic::Ordering::Relaxed),
        before
    );
}
