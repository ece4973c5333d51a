//! End-to-end panel scenarios: configuration, menu tree, navigation state
//! machine, executor and dashboard wired together with in-memory stats.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lcd_commander::core::config::Config;
use lcd_commander::hal::display::Geometry;
use lcd_commander::hal::input::InputEvent;
use lcd_commander::menu::dashboard::DashboardCycler;
use lcd_commander::menu::executor::CommandExecutor;
use lcd_commander::menu::navigation::{
    ActionOrigin, MenuSession, Mode, SessionCmd, SessionMsg, SessionOptions, update,
};
use lcd_commander::menu::tree::MenuTree;
use lcd_commander::stats::{StatMethod, StaticStats};

const PANEL: &str = r#"
hardware:
  i2c: { cols: 16, rows: 2 }
  display: { idle_timeout: 15.0, dashboard_cycle_time: 5.0 }
execution: { timeout_secs: 1.0, result_flash_ms: 2000 }
menu:
  - label: System Info
    items:
      - label: IP Address
        action: "stat:get_ip"
        wait_for_key: true
      - label: Hostname
        action: "stat:get_hostname"
  - label: Tools
    items:
      - label: Fail
        action: exit 1
      - label: Hang
        action: sleep 5
dashboard:
  pages:
    - - { label: "IP: ", stat: "stat:get_ip" }
    - - { label: "Temp: ", stat: "stat:get_cpu_temp" }
quick_launch:
  command: echo quick
  wait_for_key: true
"#;

/// Session plus executor, driven the way the control loop drives them.
struct Panel {
    session: MenuSession,
    executor: CommandExecutor,
    t0: Instant,
}

impl Panel {
    fn new() -> Self {
        let config = Config::from_yaml_str(PANEL).unwrap();
        config.validate().unwrap();
        let stats = StaticStats::new()
            .with(StatMethod::Ip, "10.0.0.7")
            .with(StatMethod::Hostname, "rack-pi");
        let t0 = Instant::now();
        let tree = MenuTree::load(&config.menu).unwrap();
        Self {
            session: MenuSession::new(tree, SessionOptions::from_config(&config), t0),
            executor: CommandExecutor::new(
                Arc::new(stats),
                Duration::from_secs_f64(config.execution.timeout_secs),
                Geometry::from(&config.hardware.i2c),
            ),
            t0,
        }
    }

    fn at(&self, secs: u64) -> Instant {
        self.t0 + Duration::from_secs(secs)
    }

    /// Feed one input and run any requested action to completion.
    fn press(&mut self, event: InputEvent, secs: u64) -> Vec<SessionCmd> {
        let now = self.at(secs);
        let mut seen = Vec::new();
        let mut queue = update(&mut self.session, SessionMsg::Input(event, now)).into_vec();
        while let Some(cmd) = queue.pop() {
            if let SessionCmd::Execute { action, .. } = &cmd {
                let result = self.executor.run(action);
                queue.extend(
                    update(&mut self.session, SessionMsg::ActionFinished(result, now)).into_vec(),
                );
            }
            seen.push(cmd);
        }
        seen
    }

    fn screen(&self) -> String {
        self.session
            .current_frame()
            .map(|frame| frame.to_text())
            .unwrap_or_default()
    }
}

#[test]
fn stat_leaf_with_wait_returns_to_its_level() {
    let mut panel = Panel::new();
    panel.press(InputEvent::Select, 1);
    assert_eq!(panel.session.mode(), Mode::Browsing);
    assert_eq!(panel.screen(), ">System Info\n Tools");

    panel.press(InputEvent::Select, 2);
    assert_eq!(panel.screen(), ">IP Address\n Hostname");

    panel.press(InputEvent::Select, 3);
    assert_eq!(panel.session.mode(), Mode::AwaitingAck);
    assert_eq!(panel.screen(), "10.0.0.7\n");

    panel.press(InputEvent::Back, 4);
    assert_eq!(panel.session.mode(), Mode::Browsing);
    assert_eq!(panel.session.breadcrumb(), vec!["System Info", "IP Address"]);
    assert_eq!(panel.screen(), ">IP Address\n Hostname");
}

#[test]
fn failing_command_without_wait_stays_browsing() {
    let mut panel = Panel::new();
    panel.press(InputEvent::Home, 1);
    panel.press(InputEvent::ScrollDown, 2);
    panel.press(InputEvent::Select, 3);
    panel.press(InputEvent::Select, 4);

    assert_eq!(panel.session.mode(), Mode::Browsing);
    assert_eq!(panel.screen(), "Error\n");
    assert_eq!(panel.session.state().path, vec![1]);
    assert_eq!(panel.session.state().selection, 0);

    let expiry = panel.at(4) + Duration::from_millis(2000);
    let cmd = update(&mut panel.session, SessionMsg::Tick(expiry));
    assert!(matches!(cmd, SessionCmd::Render(_)));
    assert_eq!(panel.screen(), ">Fail\n Hang");
}

#[test]
fn hanging_command_times_out() {
    let mut panel = Panel::new();
    panel.press(InputEvent::Home, 1);
    panel.press(InputEvent::ScrollDown, 2);
    panel.press(InputEvent::Select, 3);
    panel.press(InputEvent::ScrollDown, 4);

    let started = Instant::now();
    panel.press(InputEvent::Select, 5);
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
    assert_eq!(panel.screen(), "Timed out\n");
    assert_eq!(panel.session.mode(), Mode::Browsing);
}

#[test]
fn quick_launch_preserves_position() {
    let mut panel = Panel::new();
    panel.press(InputEvent::Select, 1);
    panel.press(InputEvent::ScrollDown, 2);

    let cmds = panel.press(InputEvent::QuickLaunch, 3);
    assert!(cmds.iter().any(|cmd| matches!(
        cmd,
        SessionCmd::Execute {
            origin: ActionOrigin::QuickLaunch,
            ..
        }
    )));
    assert_eq!(panel.session.mode(), Mode::AwaitingAck);
    assert_eq!(panel.screen(), "quick\n");

    panel.press(InputEvent::ScrollUp, 4);
    assert_eq!(panel.screen(), " System Info\n>Tools");
}

#[test]
fn idle_timeout_then_single_input_wakes_at_root() {
    let mut panel = Panel::new();
    panel.press(InputEvent::Select, 1);
    panel.press(InputEvent::Select, 2);
    panel.press(InputEvent::ScrollDown, 3);

    let now = panel.at(18);
    let cmd = update(&mut panel.session, SessionMsg::Tick(now));
    assert_eq!(cmd, SessionCmd::StartDashboard);
    assert_eq!(panel.session.mode(), Mode::Idle);

    let cmds = panel.press(InputEvent::Select, 20);
    assert_eq!(cmds.len(), 1);
    assert_eq!(panel.session.mode(), Mode::Browsing);
    assert!(panel.session.state().path.is_empty());
    assert_eq!(panel.session.state().selection, 0);
}

#[test]
fn dashboard_pages_rotate_round_robin() {
    let config = Config::from_yaml_str(PANEL).unwrap();
    let stats = StaticStats::new()
        .with(StatMethod::Ip, "10.0.0.7")
        .with(StatMethod::CpuTemp, "48.2C");
    let mut cycler = DashboardCycler::from_config(&config).unwrap();
    let t0 = Instant::now();
    cycler.start(t0);

    let mut shown = Vec::new();
    for secs in 0..15 {
        if let Some(frame) = cycler.tick(t0 + Duration::from_secs(secs), &stats) {
            shown.push(frame.lines()[0].clone());
        }
    }
    assert_eq!(shown, vec!["IP: 10.0.0.7", "Temp: 48.2C", "IP: 10.0.0.7"]);
}
