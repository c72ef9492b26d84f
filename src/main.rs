mod clipboard;
mod config;
mod error;
mod follower;
mod highlight;
mod layout;
mod pager;
mod pane;
mod render;
mod runtime;
mod search;
mod selection;
mod text;
mod theme;
mod view;

use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Stdout};
use std::sync::Mutex;
use std::time::Duration;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::clipboard::{Passthrough, copy_to_clipboard};
use crate::config::{Invocation, parse_args, usage};
use crate::error::AppError;
use crate::pager::PagerCommand;
use crate::runtime::{Cmd, Effect, Message, Runtime};
use crate::theme::Theme;
use crate::view::LogView;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const RELEASE_GRACE: Duration = Duration::from_secs(2);

struct TerminalGuard {
    mouse: bool,
}

impl TerminalGuard {
    fn enter(stdout: &mut Stdout, mouse: bool) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, Hide)?;
        if mouse {
            execute!(stdout, EnableMouseCapture)?;
        }
        Ok(Self { mouse })
    }

    fn set_mouse(&mut self, stdout: &mut Stdout, enabled: bool) -> io::Result<()> {
        if enabled {
            execute!(stdout, EnableMouseCapture)?;
        } else {
            execute!(stdout, DisableMouseCapture)?;
        }
        self.mouse = enabled;
        Ok(())
    }

    fn suspend(&mut self, stdout: &mut Stdout) -> io::Result<()> {
        terminal::disable_raw_mode()?;
        execute!(stdout, Show, DisableMouseCapture, LeaveAlternateScreen)
    }

    fn resume(&mut self, stdout: &mut Stdout) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, Hide)?;
        if self.mouse {
            execute!(stdout, EnableMouseCapture)?;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, Show, DisableMouseCapture, LeaveAlternateScreen);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = match std::env::var_os("JOBTAIL_LOG") {
        Some(path) => match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
            Err(err) => {
                eprintln!("jobtail: cannot open log file {}: {err}", path.to_string_lossy());
                BoxMakeWriter::new(io::sink)
            }
        },
        None => BoxMakeWriter::new(io::sink),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
}

struct App {
    stdout: Stdout,
    guard: TerminalGuard,
    runtime: Runtime,
    view: LogView,
    passthrough: Passthrough,
}

impl App {
    fn dispatch(&mut self, cmds: Vec<Cmd>) -> Result<(), AppError> {
        for cmd in cmds {
            match cmd {
                Cmd::Task(task) => self.runtime.spawn(task)?,
                Cmd::Effect(effect) => self.apply(effect)?,
            }
        }
        Ok(())
    }

    fn handle(&mut self, message: Message) -> Result<(), AppError> {
        let cmds = self.view.update(message);
        self.dispatch(cmds)
    }

    fn apply(&mut self, effect: Effect) -> Result<(), AppError> {
        match effect {
            Effect::MouseCapture(enabled) => self.guard.set_mouse(&mut self.stdout, enabled)?,
            Effect::Clipboard(text) => {
                match copy_to_clipboard(&mut self.stdout, &text, self.passthrough) {
                    Ok(count) => self.view.set_status(format!("Copied {count} chars")),
                    Err(err) => {
                        tracing::warn!(%err, "clipboard copy failed");
                        self.view.set_status(format!("Copy failed: {err}"));
                    }
                }
            }
            Effect::Pager(path) => {
                self.guard.suspend(&mut self.stdout)?;
                let outcome = PagerCommand::from_env(&path).and_then(|pager| pager.run());
                self.guard.resume(&mut self.stdout)?;
                match outcome {
                    Ok(status) if !status.success() => {
                        self.view.set_status(format!("Pager exited with {status}"));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(%err, "pager failed");
                        self.view.set_status(format!("Pager failed: {err}"));
                    }
                }
            }
            Effect::Quit => {}
        }
        Ok(())
    }

    fn event_loop(&mut self) -> Result<(), AppError> {
        let cmds = self.view.init();
        self.dispatch(cmds)?;

        let mut dirty = true;
        loop {
            if dirty {
                self.view.flush_render_cache();
                render::draw(&mut self.stdout, &self.view)?;
                dirty = false;
            }

            while event::poll(Duration::ZERO)? {
                let input = event::read()?;
                self.handle(Message::Input(input))?;
                dirty = true;
            }
            if self.view.should_quit() {
                return Ok(());
            }

            if let Some(message) = self.runtime.recv_timeout(POLL_INTERVAL) {
                self.handle(message)?;
                while let Some(message) = self.runtime.try_recv() {
                    self.handle(message)?;
                }
                dirty = true;
            }
        }
    }
}

fn run() -> Result<(), AppError> {
    let mut args = std::env::args();
    let binary = args.next().unwrap_or_else(|| "jobtail".to_owned());
    let options = match parse_args(args) {
        Ok(Invocation::Run(options)) => options,
        Ok(Invocation::Help) => {
            println!("{}", usage(&binary));
            return Ok(());
        }
        Err(err) => {
            eprintln!("{binary}: {err}\n\n{}", usage(&binary));
            std::process::exit(2);
        }
    };

    if !io::stdout().is_terminal() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "stdout must be a TTY (run this in a terminal, not redirected)",
        )
        .into());
    }

    init_logging();
    tracing::info!(
        stdout = %options.stdout_path,
        stderr = %options.stderr_path,
        job = ?options.job_id,
        capacity = options.capacity,
        "starting"
    );

    let mut stdout = io::stdout();
    let guard = TerminalGuard::enter(&mut stdout, options.mouse)?;
    let size = terminal::size()
        .map(|(width, height)| (usize::from(width), usize::from(height)))
        .unwrap_or((0, 0));

    let mut app = App {
        stdout,
        guard,
        runtime: Runtime::new(),
        view: LogView::new(&options, size, Theme::dark()),
        passthrough: Passthrough::from_env(),
    };
    let result = app.event_loop();

    // Errors can leave followers running; tear down before waiting.
    let cmds = app.view.teardown();
    for cmd in cmds {
        if let Cmd::Task(task) = cmd
            && let Err(err) = app.runtime.spawn(task)
        {
            tracing::warn!(%err, "could not start cleanup task");
        }
    }

    let App {
        guard, mut runtime, ..
    } = app;
    drop(guard);
    tracing::debug!(pending = runtime.pending_releases(), "waiting for follow cleanup");
    runtime.wait_for_releases(RELEASE_GRACE);
    tracing::info!("exiting");
    result
}

fn main() {
    if let Err(err) = run() {
        eprintln!("jobtail failed: {err}");
        std::process::exit(1);
    }
}
