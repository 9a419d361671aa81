use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use triviasync::prelude::*;
use triviasync::DEFAULT_URL;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Create(String),
    Join(String),
    Start,
    Answer(String),
    Right,
    Wrong,
    Again,
    Leave,
    Quit,
}

fn parse(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let cmd = words.next().ok_or("empty line")?;
    let rest = words.collect::<Vec<_>>().join(" ");
    let arg = |what: &str| {
        if rest.is_empty() {
            Err(format!("{cmd} needs {what}"))
        } else {
            Ok(rest.clone())
        }
    };

    match cmd {
        "create" => Ok(Input::Create(arg("a room code")?.to_uppercase())),
        "join" => Ok(Input::Join(arg("a room code")?.to_uppercase())),
        "start" => Ok(Input::Start),
        "answer" | "a" => Ok(Input::Answer(arg("an answer")?)),
        "right" => Ok(Input::Right),
        "wrong" => Ok(Input::Wrong),
        "again" => Ok(Input::Again),
        "leave" => Ok(Input::Leave),
        "quit" | "exit" => Ok(Input::Quit),
        other => Err(format!("unknown command: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

fn render(session: &Session) -> String {
    let mut out = format!(
        "[{} {}] score {} ({}/{} right, {})",
        session.room_code,
        session.game_state,
        session.score,
        session.correct_answers,
        session.questions_asked,
        session.difficulty,
    );
    let names: Vec<&str> = session.players.iter().map(|p| p.name.as_str()).collect();
    out.push_str(&format!("\n  players: {}", names.join(", ")));

    match session.game_state {
        GameState::Playing => {
            if let Some(q) = &session.current_question {
                out.push_str(&format!("\n  Q: {} ({}s)", q.text, session.time_left));
                for (i, answer) in q.answers.iter().enumerate() {
                    out.push_str(&format!("\n    {}. {answer}", i + 1));
                }
            }
        }
        GameState::Finished => {
            for (rank, p) in session.leaderboard.iter().enumerate() {
                out.push_str(&format!("\n  #{} {} {}", rank + 1, p.name, p.score));
            }
        }
        _ => {}
    }
    if let Some(error) = &session.last_error {
        out.push_str(&format!("\n  ! {error}"));
    }
    out
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), TriviaError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let url = std::env::var("TRIVIASYNC_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let name = std::env::args().nth(1).unwrap_or_else(|| "player".to_string());
    eprintln!("connecting to {url} as {name}");

    let client = TriviaClient::builder().url(url).build();

    let mut sessions = client.session();
    tokio::spawn(async move {
        while sessions.changed().await.is_ok() {
            if let Some(session) = sessions.borrow_and_update().as_ref() {
                println!("{}", render(session));
            }
        }
    });

    let mut connectivity = client.connectivity();
    tokio::spawn(async move {
        while connectivity.changed().await.is_ok() {
            let state = connectivity.borrow_and_update().clone();
            if state.terminal {
                eprintln!("connection lost for good");
                break;
            }
            tracing::info!(status = ?state.status, attempt = state.reconnect_attempt, "connectivity");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let input = match parse(&line) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        let accepted = match input {
            Input::Create(code) => client.create_room(&code, &name).await?,
            Input::Join(code) => client.join_room(&code, &name).await?,
            Input::Start => client.start_game().await?,
            Input::Answer(answer) => client.submit_answer(&answer).await?,
            Input::Right => client.resolve_answer(true).await.map(|_| true)?,
            Input::Wrong => client.resolve_answer(false).await.map(|_| true)?,
            Input::Again => client.play_again().await?,
            Input::Leave => client.leave_room().await?,
            Input::Quit => break,
        };
        if !accepted {
            eprintln!("ignored");
        }
    }

    client.shutdown().await;
    Ok(())
}
