//! Pure navigation state machine for the menu panel.
//!
//! [`update`] takes the session and a message, mutates the session, and
//! returns a [`SessionCmd`] describing the side-effects the control loop
//! should perform. It performs no I/O and reads no clock: every message
//! carries the `Instant` it happened at, so transitions are deterministic.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::config::{Config, QuickLaunchConfig};
use crate::hal::display::{Frame, Geometry, truncate_chars};
use crate::hal::input::InputEvent;
use crate::menu::executor::ExecutionResult;
use crate::menu::tree::{MenuNode, MenuTree};

// ──────────────────── state ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Dashboard owns the display.
    Idle,
    Browsing,
    /// A result is held on screen until the next input.
    AwaitingAck,
}

impl Mode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Browsing => "browsing",
            Self::AwaitingAck => "awaiting_ack",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOrigin {
    Menu,
    QuickLaunch,
}

/// Action handed to the executor and not yet finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub action: String,
    pub wait_for_key: bool,
    pub origin: ActionOrigin,
    pub started: Instant,
}

/// Result shown briefly before the menu comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub frame: Frame,
    pub until: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    /// Indices of entered branches, from the root.
    pub path: Vec<usize>,
    pub selection: usize,
    /// First visible row of the current level.
    pub view_offset: usize,
    pub mode: Mode,
    pub last_activity: Instant,
    pub pending: Option<PendingAction>,
    pub flash: Option<Flash>,
    /// Frame held while awaiting acknowledgement.
    pub held: Option<Frame>,
    /// `view_offset` of each level on `path`, restored by Back.
    parent_offsets: Vec<usize>,
}

impl NavigationState {
    fn new(now: Instant) -> Self {
        Self {
            path: Vec::new(),
            selection: 0,
            view_offset: 0,
            mode: Mode::Idle,
            last_activity: now,
            pending: None,
            flash: None,
            held: None,
            parent_offsets: Vec::new(),
        }
    }

    fn go_root(&mut self) {
        self.path.clear();
        self.parent_offsets.clear();
        self.selection = 0;
        self.view_offset = 0;
    }
}

/// Quick-launch action bound to the dedicated control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickLaunch {
    pub action: String,
    pub wait_for_key: bool,
}

impl QuickLaunch {
    #[must_use]
    pub fn from_config(cfg: &QuickLaunchConfig) -> Option<Self> {
        cfg.command().map(|action| Self {
            action: action.to_string(),
            wait_for_key: cfg.wait_for_key,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub geometry: Geometry,
    pub idle_timeout: Duration,
    pub flash_duration: Duration,
    pub quick_launch: Option<QuickLaunch>,
}

impl SessionOptions {
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            geometry: Geometry::from(&cfg.hardware.i2c),
            idle_timeout: cfg.hardware.display.idle_timeout(),
            flash_duration: cfg.execution.result_flash(),
            quick_launch: QuickLaunch::from_config(&cfg.quick_launch),
        }
    }
}

/// Everything mutable about the panel lives here.
#[derive(Debug, Clone)]
pub struct MenuSession {
    tree: MenuTree,
    options: SessionOptions,
    state: NavigationState,
}

// ──────────────────── messages ────────────────────

#[derive(Debug, Clone)]
pub enum SessionMsg {
    Input(InputEvent, Instant),
    ActionFinished(ExecutionResult, Instant),
    /// Periodic clock tick from the control loop.
    Tick(Instant),
}

/// Side-effects requested by [`update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCmd {
    None,
    Render(Frame),
    Execute {
        action: String,
        wait_for_key: bool,
        origin: ActionOrigin,
    },
    /// The session went idle; the dashboard takes over the display.
    StartDashboard,
    Batch(Vec<Self>),
}

impl SessionCmd {
    /// Flatten nested batches into execution order, dropping `None`.
    #[must_use]
    pub fn into_vec(self) -> Vec<Self> {
        match self {
            Self::None => Vec::new(),
            Self::Batch(cmds) => cmds.into_iter().flat_map(Self::into_vec).collect(),
            other => vec![other],
        }
    }
}

// ──────────────────── session ────────────────────

impl MenuSession {
    /// New session in [`Mode::Idle`].
    #[must_use]
    pub fn new(tree: MenuTree, options: SessionOptions, now: Instant) -> Self {
        Self {
            tree,
            options,
            state: NavigationState::new(now),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &NavigationState {
        &self.state
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.state.mode
    }

    #[must_use]
    pub const fn tree(&self) -> &MenuTree {
        &self.tree
    }

    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    #[must_use]
    pub fn quick_launch(&self) -> Option<&QuickLaunch> {
        self.options.quick_launch.as_ref()
    }

    /// Children of the current level.
    #[must_use]
    pub fn current_items(&self) -> &[MenuNode] {
        self.tree.children_of(&self.state.path)
    }

    #[must_use]
    pub fn selected_node(&self) -> Option<&MenuNode> {
        self.current_items().get(self.state.selection)
    }

    /// Labels from the top level down to the current selection.
    #[must_use]
    pub fn breadcrumb(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = (1..=self.state.path.len())
            .filter_map(|depth| self.tree.label_of(&self.state.path[..depth]))
            .collect();
        if let Some(node) = self.selected_node() {
            labels.push(node.label());
        }
        labels
    }

    #[must_use]
    pub fn render_menu(&self) -> Frame {
        render_menu(
            self.current_items(),
            self.state.selection,
            self.state.view_offset,
            self.options.geometry,
        )
    }

    /// What the panel should currently show; `None` while idle.
    #[must_use]
    pub fn current_frame(&self) -> Option<Frame> {
        match self.state.mode {
            Mode::Idle => None,
            Mode::AwaitingAck => self.state.held.clone(),
            Mode::Browsing => Some(
                self.state
                    .flash
                    .as_ref()
                    .map_or_else(|| self.render_menu(), |flash| flash.frame.clone()),
            ),
        }
    }

    fn touch(&mut self, now: Instant) {
        self.state.last_activity = now;
    }

    fn begin(
        &mut self,
        action: String,
        wait_for_key: bool,
        origin: ActionOrigin,
        now: Instant,
    ) -> SessionCmd {
        self.state.pending = Some(PendingAction {
            action: action.clone(),
            wait_for_key,
            origin,
            started: now,
        });
        SessionCmd::Execute {
            action,
            wait_for_key,
            origin,
        }
    }

    fn quick_launch_cmd(&mut self, now: Instant) -> SessionCmd {
        match self.options.quick_launch.clone() {
            Some(ql) => self.begin(ql.action, ql.wait_for_key, ActionOrigin::QuickLaunch, now),
            None => SessionCmd::None,
        }
    }

    fn scroll_down(&mut self) -> bool {
        let len = self.current_items().len();
        let rows = self.options.geometry.rows.max(1);
        let state = &mut self.state;
        if state.selection + 1 >= len {
            return false;
        }
        state.selection += 1;
        if state.selection >= state.view_offset + rows {
            state.view_offset = state.selection + 1 - rows;
        }
        true
    }

    fn scroll_up(&mut self) -> bool {
        let state = &mut self.state;
        if state.selection == 0 {
            return false;
        }
        state.selection -= 1;
        if state.selection < state.view_offset {
            state.view_offset = state.selection;
        }
        true
    }

    /// Apply one input while browsing. Returns the command and whether the
    /// visible menu changed.
    fn browse(&mut self, event: InputEvent, now: Instant) -> (SessionCmd, bool) {
        match event {
            InputEvent::ScrollDown => (SessionCmd::None, self.scroll_down()),
            InputEvent::ScrollUp => (SessionCmd::None, self.scroll_up()),
            InputEvent::Select => {
                let Some(node) = self.selected_node() else {
                    return (SessionCmd::None, false);
                };
                if node.is_branch() {
                    let state = &mut self.state;
                    state.path.push(state.selection);
                    state.parent_offsets.push(state.view_offset);
                    state.selection = 0;
                    state.view_offset = 0;
                    (SessionCmd::None, true)
                } else {
                    let action = node.action().unwrap_or_default().to_string();
                    let wait = node.wait_for_key();
                    (self.begin(action, wait, ActionOrigin::Menu, now), false)
                }
            }
            InputEvent::Back => {
                let state = &mut self.state;
                match state.path.pop() {
                    Some(parent_selection) => {
                        state.selection = parent_selection;
                        state.view_offset = state.parent_offsets.pop().unwrap_or(0);
                        (SessionCmd::None, true)
                    }
                    None => (SessionCmd::None, false),
                }
            }
            InputEvent::Home => {
                let changed = !self.state.path.is_empty() || self.state.selection != 0;
                self.state.go_root();
                (SessionCmd::None, changed)
            }
            InputEvent::QuickLaunch => (self.quick_launch_cmd(now), false),
        }
    }

    fn on_input(&mut self, event: InputEvent, now: Instant) -> SessionCmd {
        if self.state.pending.is_some() {
            return SessionCmd::None;
        }

        match self.state.mode {
            Mode::Idle => {
                // Waking consumes the event.
                self.touch(now);
                self.state.mode = Mode::Browsing;
                self.state.flash = None;
                self.state.held = None;
                self.state.go_root();
                SessionCmd::Render(self.render_menu())
            }
            Mode::AwaitingAck => {
                self.touch(now);
                self.state.mode = Mode::Browsing;
                self.state.held = None;
                let menu = SessionCmd::Render(self.render_menu());
                if event == InputEvent::QuickLaunch {
                    let launch = self.quick_launch_cmd(now);
                    SessionCmd::Batch(vec![menu, launch])
                } else {
                    menu
                }
            }
            Mode::Browsing => {
                self.touch(now);
                let flash_cleared = self.state.flash.take().is_some();
                let (cmd, changed) = self.browse(event, now);
                let render =
                    (changed || flash_cleared).then(|| SessionCmd::Render(self.render_menu()));
                match (render, cmd) {
                    (None, cmd) => cmd,
                    (Some(render), SessionCmd::None) => render,
                    (Some(render), cmd) => SessionCmd::Batch(vec![render, cmd]),
                }
            }
        }
    }

    fn on_finished(&mut self, result: &ExecutionResult, now: Instant) -> SessionCmd {
        let Some(pending) = self.state.pending.take() else {
            return SessionCmd::None;
        };
        self.touch(now);
        let frame = result.frame(self.options.geometry);
        if pending.wait_for_key {
            self.state.mode = Mode::AwaitingAck;
            self.state.held = Some(frame.clone());
        } else {
            self.state.mode = Mode::Browsing;
            self.state.flash = Some(Flash {
                frame: frame.clone(),
                until: now.checked_add(self.options.flash_duration).unwrap_or(now),
            });
        }
        SessionCmd::Render(frame)
    }

    fn on_tick(&mut self, now: Instant) -> SessionCmd {
        if self.state.mode == Mode::Idle || self.state.pending.is_some() {
            return SessionCmd::None;
        }
        if now.saturating_duration_since(self.state.last_activity) >= self.options.idle_timeout {
            self.state.mode = Mode::Idle;
            self.state.flash = None;
            self.state.held = None;
            return SessionCmd::StartDashboard;
        }
        if self.state.flash.as_ref().is_some_and(|flash| now >= flash.until) {
            self.state.flash = None;
            return SessionCmd::Render(self.render_menu());
        }
        SessionCmd::None
    }
}

/// Apply a message to the session and return what the control loop should do.
pub fn update(session: &mut MenuSession, msg: SessionMsg) -> SessionCmd {
    match msg {
        SessionMsg::Input(event, now) => session.on_input(event, now),
        SessionMsg::ActionFinished(result, now) => session.on_finished(&result, now),
        SessionMsg::Tick(now) => session.on_tick(now),
    }
}

/// Menu view: a window of `rows` items starting at `view_offset`, the selected
/// row prefixed with `>`, every other row with a space.
#[must_use]
pub fn render_menu(
    items: &[MenuNode],
    selection: usize,
    view_offset: usize,
    geometry: Geometry,
) -> Frame {
    let label_width = geometry.cols.saturating_sub(1);
    let lines = items
        .iter()
        .enumerate()
        .skip(view_offset)
        .take(geometry.rows)
        .map(|(idx, node)| {
            let prefix = if idx == selection { '>' } else { ' ' };
            format!("{prefix}{}", truncate_chars(node.label(), label_width))
        });
    Frame::new(geometry, lines)
}
