//! rewind-runner: headless driver for a rewindable arena session.
//!
//! Usage:
//!   rewind-runner --seed 12345 --ticks 600 --data-dir ./data
//!   rewind-runner --seed 12345 --ipc-mode
//!
//! In IPC mode every stdin line is one JSON control command, e.g.
//!   {"cmd":"step","event":{"keys":["right","fire"]}}
//!   {"cmd":"toggle_mode"}
//!   {"cmd":"undo"}
//!   {"cmd":"replay","name":"autosave/19-10-02-33-123456","pace":"direct"}
//! and every command is answered with exactly one JSON line.

use anyhow::Result;
use rewind_core::{
    arena::{ArenaInput, ArenaSim, Button},
    clock::PlaybackClock,
    command::ControlCommand,
    config::{RewindConfig, CONFIG_FILE},
    session::{Session, SessionStatus},
    simulation::{NullSink, Simulation},
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;

#[derive(serde::Serialize)]
struct Reply {
    status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let ticks = parse_arg(&args, "--ticks", 600u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    let config = if Path::new(data_dir).join(CONFIG_FILE).exists() {
        RewindConfig::load(data_dir)?
    } else {
        log::warn!("no {CONFIG_FILE} in {data_dir}, using defaults");
        RewindConfig::default()
    };

    if !ipc_mode {
        println!("rewind-runner");
        println!("  seed:      {seed}");
        println!("  ticks:     {ticks}");
        println!("  data_dir:  {data_dir}");
        println!("  save_dir:  {}", config.save_dir.display());
        println!();
    }

    let sim = ArenaSim::new(seed)?;
    let mut session = Session::new(sim, &config, Box::new(NullSink))?;

    if ipc_mode {
        run_ipc_loop(&mut session)?;
    } else {
        run_scripted(&mut session, ticks)?;
        print_summary(&session)?;
    }

    session.close()?;
    Ok(())
}

fn run_ipc_loop(session: &mut Session<ArenaSim>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let Some(reply) = respond(session, &buffer)? else { break };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

/// Handle one command line and build its reply. `None` means quit.
/// Command and replay failures are reported in the reply, never fatal.
fn respond<S: Simulation>(session: &mut Session<S>, line: &str) -> Result<Option<String>> {
    let cmd: ControlCommand<S::Event> = match serde_json::from_str(line) {
        Ok(c) => c,
        Err(e) => return Ok(Some(serde_json::json!({ "error": e.to_string() }).to_string())),
    };
    if matches!(cmd, ControlCommand::Quit) {
        return Ok(None);
    }

    let result = match handle_command(session, cmd) {
        Ok(result) => result,
        Err(e) => Some(serde_json::json!({ "error": e.to_string() })),
    };
    let result = match session.pump_replay(Instant::now()) {
        Ok(_) => result,
        Err(e) => {
            log::error!("replay step failed: {e}");
            session.stop_replay();
            Some(serde_json::json!({ "error": e.to_string() }))
        }
    };

    let reply = Reply { status: session.status(), result };
    Ok(Some(serde_json::to_string(&reply)?))
}

fn handle_command<S: Simulation>(
    session: &mut Session<S>,
    cmd: ControlCommand<S::Event>,
) -> Result<Option<serde_json::Value>> {
    let result = match cmd {
        ControlCommand::Step { event } => {
            session.step(event)?;
            None
        }
        ControlCommand::Undo => Some(serde_json::json!({ "moved": session.undo()? })),
        ControlCommand::Redo => Some(serde_json::json!({ "moved": session.redo()? })),
        ControlCommand::Commit => Some(serde_json::json!({ "committed": session.commit()? })),
        ControlCommand::ToggleMode => {
            Some(serde_json::json!({ "mode": session.toggle_mode()? }))
        }
        ControlCommand::Save { label } => {
            let path = session.save(&label)?;
            Some(serde_json::json!({ "saved": path.display().to_string() }))
        }
        ControlCommand::ListReplays => {
            let replays: Vec<_> = session
                .replays()?
                .into_iter()
                .map(|r| serde_json::json!({ "name": r.name, "records": r.records }))
                .collect();
            Some(serde_json::json!({ "replays": replays }))
        }
        ControlCommand::Replay { name, pace } => {
            let path = session.replay_path(&name);
            Some(serde_json::json!({ "started": session.start_replay(&path, pace)? }))
        }
        ControlCommand::StopReplay => {
            session.stop_replay();
            None
        }
        ControlCommand::SetSpeed { speed } => {
            session.clock_mut().set_speed(speed);
            None
        }
        ControlCommand::SpeedStep { delta } => {
            Some(serde_json::json!({ "speed": session.clock_mut().step_dial(delta) }))
        }
        ControlCommand::Pause => {
            session.clock_mut().pause();
            None
        }
        ControlCommand::Resume => {
            session.clock_mut().resume();
            None
        }
        ControlCommand::Status | ControlCommand::Quit => None,
    };
    Ok(result)
}

/// Drive the arena with a fixed input pattern, committed throughout.
fn run_scripted(session: &mut Session<ArenaSim>, ticks: u64) -> Result<()> {
    const PATTERN: [&[Button]; 6] = [
        &[Button::Right],
        &[Button::Right, Button::Fire],
        &[Button::Down],
        &[Button::Left, Button::Fire],
        &[Button::Up],
        &[Button::Fire],
    ];
    for i in 0..ticks {
        let keys = PATTERN[(i % PATTERN.len() as u64) as usize];
        session.step(ArenaInput::new(keys))?;
    }
    Ok(())
}

fn print_summary(session: &Session<ArenaSim>) -> Result<()> {
    let status = session.status();
    let view = session.simulation().view()?;
    let clock: &PlaybackClock = session.clock();

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", status.run_id);
    println!("  marker:         {}", status.marker);
    println!("  committed:      {}", status.committed);
    println!("  log bytes:      {}", status.log_bytes);
    println!("  log file:       {}", session.timeline().log_path().display());
    println!("  tick rate:      {:.0}/s", clock.ticks_per_second());
    println!();
    println!("=== ARENA ===");
    println!("  player hp:      {}", view.player.hp);
    println!("  enemies alive:  {}", view.enemies.len());
    println!("  enemies spawned:{}", view.spawned);
    println!("  kills:          {}", view.kills.values().sum::<i64>());
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
