//! Rotation & reconnection controller.
//!
//! Single owner of all mutable keeper state (connection state,
//! reconnect policy, sleep state, behavior slot, generation counter),
//! driven by one select loop over session events, the day/night poll,
//! the rotation/thaw timers, and shutdown. Lifecycle transitions are
//! computed by the pure state machine in `golem_core::connection`;
//! this module executes the effects.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use golem_core::{
    BehaviorKind, CommandAction, ConnectionState, Effect, ForceOutcome, GenerationCounter,
    LifecycleEvent, Mode, PersonaRoster, PhaseDetector, PhaseEdge, ReconnectConfig,
    ReconnectPolicy, SleepState, StatusSnapshot, dispatch, force_sleep, force_wake, is_night,
    is_throttle_hint, transition,
};
use golem_session::{
    Identity, SessionAction, SessionConnector, SessionEvent, WorldView,
};

use crate::behaviors::{self, BehaviorCtx, TickGuardState};
use crate::dispatch as replies;
use crate::scheduler::BehaviorScheduler;

// ─── Config ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// World-time poll period while a session is active.
    pub poll_interval: Duration,
    /// Ceiling on session construction.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(15),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ─── Controller ───────────────────────────────────────────────────

struct LiveSession {
    generation: u64,
    actions: mpsc::UnboundedSender<SessionAction>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    view: watch::Receiver<WorldView>,
}

pub struct Controller<C: SessionConnector> {
    connector: C,
    cfg: ControllerConfig,
    roster: PersonaRoster,
    persona_index: usize,
    state: ConnectionState,
    policy: ReconnectPolicy,
    generations: GenerationCounter,
    detector: PhaseDetector,
    sleep: SleepState,
    scheduler: BehaviorScheduler,
    session: Option<LiveSession>,
    /// Pending rotation deadline; `rotate_pending_advance` marks whether
    /// the firing still owes the persona-index advance (a deferred
    /// admission retry must not advance a second time).
    rotate_at: Option<Instant>,
    rotate_pending_advance: bool,
    /// One-shot freeze reset deadline.
    thaw_at: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    guard_tx: watch::Sender<TickGuardState>,
    status_tx: watch::Sender<StatusSnapshot>,
}

enum Wake {
    Shutdown,
    Event(Option<SessionEvent>),
    Poll,
    Rotate,
    Thaw,
}

impl<C: SessionConnector> Controller<C> {
    pub fn new(
        connector: C,
        roster: PersonaRoster,
        cfg: ControllerConfig,
    ) -> (Self, watch::Receiver<StatusSnapshot>) {
        let first = roster.get(0);
        let (status_tx, status_rx) = watch::channel(StatusSnapshot::idle(
            first.display_name.clone(),
            first.mode,
            Utc::now(),
        ));
        let (guard_tx, _) = watch::channel(TickGuardState {
            generation: 0,
            sleep: SleepState::Awake,
        });
        let policy = ReconnectPolicy::new(cfg.reconnect.clone());
        let controller = Self {
            connector,
            cfg,
            roster,
            persona_index: 0,
            state: ConnectionState::Idle,
            policy,
            generations: GenerationCounter::new(),
            detector: PhaseDetector::new(),
            sleep: SleepState::Awake,
            scheduler: BehaviorScheduler::new(),
            session: None,
            rotate_at: None,
            rotate_pending_advance: false,
            thaw_at: None,
            started_at: None,
            guard_tx,
            status_tx,
        };
        (controller, status_rx)
    }

    /// Drive the keeper until `shutdown` resolves.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut poll = tokio::time::interval(self.cfg.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.start().await;

        loop {
            let rotate_at = self.rotate_at;
            let thaw_at = self.thaw_at;
            let has_session = self.session.is_some();
            let active = has_session && self.state == ConnectionState::Active;

            let wake = tokio::select! {
                () = &mut shutdown => Wake::Shutdown,
                event = next_event(&mut self.session), if has_session => Wake::Event(event),
                _ = poll.tick(), if active => Wake::Poll,
                () = sleep_until_opt(rotate_at), if rotate_at.is_some() => Wake::Rotate,
                () = sleep_until_opt(thaw_at), if thaw_at.is_some() => Wake::Thaw,
            };

            match wake {
                Wake::Shutdown => {
                    self.shutdown();
                    break;
                }
                Wake::Event(Some(event)) => self.on_session_event(event),
                // The connector dropped the event stream without a
                // terminal event; treat it as a clean end.
                Wake::Event(None) => self.on_lifecycle(LifecycleEvent::End),
                Wake::Poll => self.on_clock_poll(),
                Wake::Rotate => {
                    self.rotate_at = None;
                    self.on_rotate_due().await;
                }
                Wake::Thaw => {
                    self.thaw_at = None;
                    if self.policy.try_thaw(Utc::now()) {
                        tracing::info!("retry freeze expired, attempt counter reset");
                    }
                }
            }
        }
    }

    // ─── Connection ───────────────────────────────────────────────

    async fn start(&mut self) {
        let persona = self.roster.get(self.persona_index).clone();
        let now = Utc::now();
        self.policy.record_attempt(now);
        if let Some(deadline) = self.policy.thaw_deadline() {
            self.thaw_at = Some(instant_at(now, deadline));
        }
        let generation = self.generations.bump();
        self.detector = PhaseDetector::new();
        self.sleep = SleepState::Awake;
        self.state = ConnectionState::Connecting;
        self.publish_guard();
        self.publish_status();

        tracing::info!(
            persona = %persona.display_name,
            mode = %persona.mode,
            generation,
            attempt = self.policy.attempt(),
            "connecting"
        );

        let identity = Identity::new(persona.display_name.clone());
        let attempt = tokio::time::timeout(
            self.cfg.connect_timeout,
            self.connector.connect(&identity),
        )
        .await;
        match attempt {
            Ok(Ok(handle)) => {
                self.session = Some(LiveSession {
                    generation,
                    actions: handle.actions,
                    events: handle.events,
                    view: handle.view,
                });
                self.publish_status();
            }
            Ok(Err(e)) => {
                tracing::warn!("session construction failed: {e}");
                self.on_lifecycle(LifecycleEvent::Error {
                    message: e.to_string(),
                });
            }
            Err(_) => {
                tracing::warn!("session construction timed out");
                self.on_lifecycle(LifecycleEvent::Error {
                    message: "connect timed out".to_string(),
                });
            }
        }
    }

    async fn on_rotate_due(&mut self) {
        if self.rotate_pending_advance {
            self.rotate_pending_advance = false;
            self.persona_index = self.roster.advance(self.persona_index);
        }
        let now = Utc::now();
        if self.policy.try_thaw(now) {
            tracing::info!("retry freeze expired, attempt counter reset");
            self.thaw_at = None;
        }
        if self.policy.can_connect(now) {
            self.start().await;
        } else {
            let wait = self.policy.remaining_wait_ms(now).max(1);
            tracing::info!(wait_ms = wait, "rotation deferred by admission policy");
            self.rotate_at = Some(Instant::now() + Duration::from_millis(wait));
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Chat { sender, text } => self.on_chat(&sender, &text),
            SessionEvent::Login => self.on_lifecycle(LifecycleEvent::Login),
            SessionEvent::Spawn => self.on_lifecycle(LifecycleEvent::Spawn),
            SessionEvent::Death => self.on_lifecycle(LifecycleEvent::Death),
            SessionEvent::Kicked { reason } => {
                self.on_lifecycle(LifecycleEvent::Kicked { reason });
            }
            SessionEvent::Error { message } => {
                self.on_lifecycle(LifecycleEvent::Error { message });
            }
            SessionEvent::End => self.on_lifecycle(LifecycleEvent::End),
        }
    }

    fn on_lifecycle(&mut self, event: LifecycleEvent) {
        tracing::debug!(?event, state = %self.state, "lifecycle event");
        let t = transition(self.state, &event);
        self.state = t.next;
        for effect in t.effects {
            self.apply_effect(effect);
        }
        self.publish_status();
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ResetAttempts => {
                self.policy.reset();
                self.thaw_at = None;
                self.started_at = Some(Utc::now());
            }
            Effect::StartSchedulers => {
                self.publish_guard();
                let mode = self.roster.get(self.persona_index).mode;
                self.start_behavior(BehaviorKind::idle_for(mode));
            }
            Effect::AnnounceArrival => {
                let mode = self.roster.get(self.persona_index).mode;
                self.chat(format!(
                    "Hello! {} mode activated!",
                    mode.as_str().to_uppercase()
                ));
            }
            Effect::AnnounceDeath => {
                self.chat("I died! But I will be back...".to_string());
            }
            Effect::StopSchedulers => self.scheduler.stop(),
            Effect::ScheduleRotation { kind, detail } => {
                if let Some(d) = &detail
                    && is_throttle_hint(d)
                {
                    tracing::warn!(detail = %d, "throttle hint in terminal reason, escalating cooldown");
                    self.policy.escalate();
                }
                tracing::warn!(
                    ?kind,
                    ?detail,
                    attempt = self.policy.attempt(),
                    "session ended, scheduling rotation"
                );
                self.session = None;
                self.sleep = SleepState::Awake;
                self.detector = PhaseDetector::new();
                let delay = self.policy.retry_delay_ms();
                self.rotate_pending_advance = true;
                self.rotate_at = Some(Instant::now() + Duration::from_millis(delay));
            }
        }
    }

    fn shutdown(&mut self) {
        tracing::info!("shutdown signal: disconnecting session");
        self.send(SessionAction::Disconnect);
        self.scheduler.stop();
        self.session = None;
        self.publish_status();
    }

    // ─── Day/night ────────────────────────────────────────────────

    fn on_clock_poll(&mut self) {
        let world_time = self.view().world_time;
        match self.detector.observe(world_time) {
            Some(PhaseEdge::NightStart) => {
                let (next, changed) = self.sleep.on_night_start();
                self.sleep = next;
                if changed {
                    self.enter_sleep();
                }
            }
            Some(PhaseEdge::DayStart) => {
                let (next, changed) = self.sleep.on_day_start();
                self.sleep = next;
                if changed {
                    self.wake_up();
                }
            }
            None => {}
        }
        self.publish_status();
    }

    fn enter_sleep(&mut self) {
        tracing::info!("night: going to sleep");
        self.chat("Time to sleep. Good night!".to_string());
        self.publish_guard();
        self.start_behavior(BehaviorKind::Rest);
    }

    fn wake_up(&mut self) {
        tracing::info!("day: waking up");
        self.chat("Good morning! Time for activities!".to_string());
        self.publish_guard();
        let mode = self.roster.get(self.persona_index).mode;
        self.start_behavior(BehaviorKind::idle_for(mode));
    }

    // ─── Commands ─────────────────────────────────────────────────

    fn on_chat(&mut self, sender: &str, text: &str) {
        let persona = self.roster.get(self.persona_index).clone();
        let Some(action) = dispatch(
            sender,
            &persona.display_name,
            text,
            persona.mode,
            self.sleep.is_asleep(),
        ) else {
            return;
        };
        tracing::debug!(?action, sender, "chat command");
        self.apply_command(action, sender, persona.mode);
    }

    fn apply_command(&mut self, action: CommandAction, sender: &str, mode: Mode) {
        match action {
            CommandAction::Greet => self.chat(replies::greeting(sender)),
            CommandAction::ReportMode => self.chat(replies::mode_line(mode)),
            CommandAction::ManualRotate => self.manual_rotate(),
            CommandAction::ShowHelp => {
                if let Some(live) = &self.session {
                    replies::spawn_help_emitter(live.actions.clone(), mode);
                }
            }
            CommandAction::ShowStatus => {
                let view = self.view();
                self.chat(replies::status_line(mode, self.sleep, &view));
            }
            CommandAction::ShowUptime => {
                if let Some(started) = self.started_at {
                    self.chat(replies::uptime_line(started, Utc::now(), mode));
                }
            }
            CommandAction::ForceSleep => {
                let night_now = is_night(self.view().world_time);
                match force_sleep(&mut self.sleep, night_now) {
                    ForceOutcome::Applied => self.enter_sleep(),
                    ForceOutcome::Unchanged => {}
                    ForceOutcome::Rejected => {
                        self.chat("It's not night yet! I only sleep at night.".to_string());
                    }
                }
            }
            CommandAction::ForceWake => {
                let night_now = is_night(self.view().world_time);
                match force_wake(&mut self.sleep, night_now) {
                    ForceOutcome::Applied => self.wake_up(),
                    ForceOutcome::Unchanged => {}
                    ForceOutcome::Rejected => {
                        self.chat("It's still night! I should sleep.".to_string());
                    }
                }
            }
            CommandAction::Guard => {
                self.chat("Guarding this spot!".to_string());
                self.start_behavior(BehaviorKind::Guard);
            }
            CommandAction::Patrol => {
                self.chat("Starting patrol.".to_string());
                self.start_behavior(BehaviorKind::Patrol);
            }
            CommandAction::FollowSender => self.start_targeted(
                BehaviorKind::Follow(sender.to_string()),
                sender,
                format!("Following {sender}!"),
            ),
            CommandAction::ComeToSender => match self.view().player(sender) {
                Some(seen) => {
                    let eye = seen.position.eye();
                    self.send(SessionAction::LookAt(eye));
                    self.chat(format!("Coming to {sender}!"));
                }
                None => self.chat(format!("I can't see {sender} nearby.")),
            },
            CommandAction::StopTask => {
                self.chat("Standing down.".to_string());
                self.start_behavior(BehaviorKind::idle_for(mode));
            }
            CommandAction::RespondToMention => {
                let line =
                    behaviors::pick(&mut rand::rng(), behaviors::MENTION_RESPONSES).to_string();
                self.chat(line);
                if let Some(seen) = self.view().player(sender) {
                    let eye = seen.position.eye();
                    self.send(SessionAction::LookAt(eye));
                }
            }
            CommandAction::StalkSender => self.start_targeted(
                BehaviorKind::Stalk(sender.to_string()),
                sender,
                format!("Stalking {sender}..."),
            ),
            CommandAction::HauntSender => self.start_targeted(
                BehaviorKind::Haunt(sender.to_string()),
                sender,
                format!("Haunting {sender}!"),
            ),
            CommandAction::Vanish => {
                self.chat("*vanishes into the shadows*".to_string());
                self.start_behavior(BehaviorKind::idle_for(mode));
            }
            CommandAction::CreepyMessage => {
                let line = behaviors::pick(&mut rand::rng(), behaviors::CREEPY_LINES).to_string();
                self.chat(line);
            }
            CommandAction::SleepingNotice => {
                self.chat(replies::sleeping_notice(mode).to_string());
            }
        }
    }

    /// Operator rotation: not a failure, so the attempt counter is
    /// cleared and the inter-rotation delay skipped. Admission is still
    /// checked when the rotation fires.
    fn manual_rotate(&mut self) {
        tracing::info!("manual rotation requested");
        self.chat("Rotating to the next persona...".to_string());
        self.send(SessionAction::Disconnect);
        self.scheduler.stop();
        self.session = None;
        self.sleep = SleepState::Awake;
        self.detector = PhaseDetector::new();
        self.policy.reset();
        self.thaw_at = None;
        self.state = ConnectionState::Disconnected;
        self.rotate_pending_advance = true;
        self.rotate_at = Some(Instant::now());
        self.publish_status();
    }

    fn start_targeted(&mut self, kind: BehaviorKind, sender: &str, announce: String) {
        if self.view().player(sender).is_none() {
            self.chat(format!("I can't see {sender} nearby."));
            return;
        }
        self.chat(announce);
        self.start_behavior(kind);
    }

    // ─── Plumbing ─────────────────────────────────────────────────

    fn start_behavior(&mut self, kind: BehaviorKind) {
        let Some(live) = &self.session else {
            return;
        };
        let ctx = BehaviorCtx {
            kind: kind.clone(),
            generation: live.generation,
            period: Duration::from_millis(kind.period_ms()),
            guard: self.guard_tx.subscribe(),
            actions: live.actions.clone(),
            view: live.view.clone(),
        };
        self.scheduler.start(kind, move || behaviors::spawn(ctx));
    }

    fn view(&self) -> WorldView {
        self.session
            .as_ref()
            .map(|live| live.view.borrow().clone())
            .unwrap_or_default()
    }

    fn chat(&self, text: String) {
        self.send(SessionAction::Chat(text));
    }

    fn send(&self, action: SessionAction) {
        if let Some(live) = &self.session
            && live.actions.send(action).is_err()
        {
            tracing::debug!("action dropped: session channel closed");
        }
    }

    fn publish_guard(&self) {
        self.guard_tx.send_replace(TickGuardState {
            generation: self.generations.current(),
            sleep: self.sleep,
        });
    }

    fn publish_status(&self) {
        let persona = self.roster.get(self.persona_index);
        self.status_tx.send_replace(StatusSnapshot {
            connection_state: self.state,
            persona: persona.display_name.clone(),
            mode: persona.mode,
            generation: self.generations.current(),
            is_night: self.detector.is_night(),
            is_sleeping: self.sleep.is_asleep(),
            updated_at: Utc::now(),
        });
    }
}

// ─── Entry point ──────────────────────────────────────────────────

/// Run the keeper: controller loop + UDS status server, until ctrl-c
/// or SIGTERM.
pub async fn run_keeper(opts: crate::cli::RunOpts, socket_path: &str) -> anyhow::Result<()> {
    let roster = crate::cli::build_roster(&opts.personas).map_err(|e| anyhow::anyhow!(e))?;
    let connector = golem_session::BridgeConnector::new(format!("{}:{}", opts.host, opts.port));
    let cfg = ControllerConfig {
        poll_interval: Duration::from_secs(opts.poll_interval_secs),
        ..Default::default()
    };
    let (controller, status) = Controller::new(connector, roster, cfg);

    let server_socket = socket_path.to_string();
    let server_status = status.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = crate::server::run_server(&server_socket, server_status).await {
            tracing::error!("status server error: {e}");
        }
    });

    // Graceful teardown on ctrl-c or SIGTERM.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    controller.run(shutdown).await;

    server_handle.abort();
    let _ = std::fs::remove_file(socket_path);
    tracing::info!("keeper stopped");
    Ok(())
}

// ─── Select helpers ───────────────────────────────────────────────

async fn next_event(session: &mut Option<LiveSession>) -> Option<SessionEvent> {
    match session.as_mut() {
        Some(live) => live.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

fn instant_at(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Instant {
    let ms = deadline.signed_duration_since(now).num_milliseconds().max(0) as u64;
    Instant::now() + Duration::from_millis(ms)
}

// ─── Tests ────────────────────────────────────────────────────────
