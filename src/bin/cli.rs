// Codeshare Server CLI Validation Tool
// Validates server functionality through automated scenarios and interactive commands

use clap::{Parser, Subcommand};
use colored::*;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "codeshare-cli")]
#[command(about = "Codeshare Server CLI Validation Tool", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:8080)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// List the exercise catalog
    Exercises,

    /// Test WebSocket connection
    Connect,

    /// Join a room and print everything the room broadcasts
    Join {
        /// Room id (doubles as exercise id)
        #[arg(short, long)]
        room: String,

        /// User id to join as
        #[arg(short, long)]
        user_id: String,

        /// Keep listening for broadcasts (press Ctrl+C to exit)
        #[arg(short, long)]
        keep_alive: bool,
    },

    /// Join a room, send one code update and print the echo
    Update {
        #[arg(short, long)]
        room: String,

        #[arg(short, long)]
        user_id: String,

        /// Code text to send
        #[arg(short, long)]
        code: String,
    },

    /// Run the automated mentor/student validation scenario
    Validate {
        /// Room id to run the scenario in
        #[arg(short, long, default_value = "2")]
        room: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => check_health(&cli.server).await,
        Commands::Exercises => list_exercises(&cli.server).await,
        Commands::Connect => test_connection(&cli.server).await,
        Commands::Join {
            room,
            user_id,
            keep_alive,
        } => join_room(&cli.server, room, user_id, *keep_alive).await,
        Commands::Update {
            room,
            user_id,
            code,
        } => send_update(&cli.server, room, user_id, code).await,
        Commands::Validate { room } => run_validation(&cli.server, room).await,
    }
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/health", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            let status = resp.status();
            if status.is_success() {
                println!("{} Health check passed", "✓".green());

                if let Ok(body) = resp.json::<serde_json::Value>().await {
                    println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
                    println!("  Service: {}", body["service"].as_str().unwrap_or("unknown"));
                    println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
                }
            } else {
                println!("{} Health check failed: {}", "✗".red(), status);
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            println!("  Make sure the server is running on {}", server);
        }
    }
}

async fn list_exercises(server: &str) {
    println!("{}", "Fetching exercise catalog...".cyan());

    let url = format!("http://{}/exercises", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => match resp.json::<Vec<serde_json::Value>>().await {
            Ok(exercises) => {
                println!("{} {} exercises available", "✓".green(), exercises.len());
                for exercise in exercises {
                    println!(
                        "  [{}] {}",
                        exercise["id"].as_str().unwrap_or("?").yellow(),
                        exercise["title"].as_str().unwrap_or("untitled")
                    );
                }
            }
            Err(e) => println!("{} Malformed listing: {}", "✗".red(), e),
        },
        Err(e) => println!("{} Cannot connect to server: {}", "✗".red(), e),
    }
}

async fn test_connection(server: &str) {
    println!("{}", "Testing WebSocket connection...".cyan());

    let url = format!("ws://{}/ws", server);
    match connect_async(&url).await {
        Ok((ws_stream, _)) => {
            println!("{} WebSocket connection established", "✓".green());
            drop(ws_stream);
        }
        Err(e) => {
            println!("{} WebSocket connection failed: {}", "✗".red(), e);
        }
    }
}

async fn join_room(server: &str, room: &str, user_id: &str, keep_alive: bool) {
    let url = format!("ws://{}/ws", server);
    let (ws_stream, _) = match connect_async(&url).await {
        Ok(pair) => pair,
        Err(e) => {
            println!("{} Cannot connect: {}", "✗".red(), e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let join = json!({"type": "join", "room": room, "user_id": user_id});
    if let Err(e) = write.send(Message::Text(join.to_string())).await {
        println!("{} Failed to send join: {}", "✗".red(), e);
        return;
    }

    match timeout(Duration::from_secs(2), read.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => {
            let reply: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
            println!(
                "{} Joined room {} as {}",
                "✓".green(),
                room.yellow(),
                reply["role"].as_str().unwrap_or("?").yellow()
            );
            if let Some(code) = reply["code"].as_str() {
                if !code.is_empty() {
                    println!("{}", "--- editor seed ---".dimmed());
                    println!("{}", code);
                }
            }
        }
        _ => {
            println!("{} No join reply within 2s", "✗".red());
            return;
        }
    }

    if keep_alive {
        println!("{}", "Listening for room broadcasts (Ctrl+C to exit)...".cyan());
        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => println!("{} {}", "«".dimmed(), text),
                    Some(Ok(_)) => {}
                    _ => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        let leave = json!({"type": "leave", "room": room, "user_id": user_id});
        let _ = write.send(Message::Text(leave.to_string())).await;
    }
}

async fn send_update(server: &str, room: &str, user_id: &str, code: &str) {
    let url = format!("ws://{}/ws", server);
    let (ws_stream, _) = match connect_async(&url).await {
        Ok(pair) => pair,
        Err(e) => {
            println!("{} Cannot connect: {}", "✗".red(), e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let join = json!({"type": "join", "room": room, "user_id": user_id});
    write.send(Message::Text(join.to_string())).await.ok();
    // drain the join reply (and mentor view, if any)
    let _ = timeout(Duration::from_millis(500), read.next()).await;

    let update = json!({"type": "update_code", "room": room, "user_id": user_id, "code": code});
    if let Err(e) = write.send(Message::Text(update.to_string())).await {
        println!("{} Failed to send update: {}", "✗".red(), e);
        return;
    }

    match timeout(Duration::from_secs(2), read.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => {
            println!("{} Update echoed: {}", "✓".green(), text);
        }
        _ => println!("{} No echo within 2s (throttled?)", "✗".red()),
    }
}

/// End-to-end scenario: mentor joins, student joins and is seeded,
/// student update is broadcast, student leaves.
async fn run_validation(server: &str, room: &str) {
    println!("{}", format!("Running validation scenario in room {}...", room).cyan());
    let url = format!("ws://{}/ws", server);

    let (mentor_stream, _) = connect_async(&url).await.expect("cannot connect mentor");
    let (mut mentor_write, mut mentor_read) = mentor_stream.split();

    let mentor_join = json!({"type": "join", "room": room, "user_id": "cli-mentor"});
    mentor_write
        .send(Message::Text(mentor_join.to_string()))
        .await
        .expect("mentor join failed");

    let reply = expect_text(&mut mentor_read, "mentor join reply").await;
    assert_step(reply["role"] == "mentor", "first joiner becomes Mentor");

    let (student_stream, _) = connect_async(&url).await.expect("cannot connect student");
    let (mut student_write, mut student_read) = student_stream.split();

    let student_join = json!({"type": "join", "room": room, "user_id": "cli-student"});
    student_write
        .send(Message::Text(student_join.to_string()))
        .await
        .expect("student join failed");

    let reply = expect_text(&mut student_read, "student join reply").await;
    assert_step(reply["role"] == "student", "second joiner becomes Student");
    let seeded = reply["code"].as_str().unwrap_or("").to_string();
    assert_step(!seeded.contains("your solution here"), "template placeholder stripped");

    sleep(Duration::from_millis(100)).await;

    let update =
        json!({"type": "update_code", "room": room, "user_id": "cli-student", "code": "return max"});
    student_write
        .send(Message::Text(update.to_string()))
        .await
        .expect("update failed");

    let broadcast = expect_text(&mut mentor_read, "update broadcast to mentor").await;
    assert_step(broadcast["type"] == "code_updated", "mentor receives code_updated");
    assert_step(broadcast["student_name"] == "Student 1", "display name is Student 1");

    let leave = json!({"type": "leave", "room": room, "user_id": "cli-student"});
    student_write
        .send(Message::Text(leave.to_string()))
        .await
        .expect("leave failed");

    let left = expect_text(&mut mentor_read, "leave broadcast to mentor").await;
    assert_step(left["type"] == "left", "mentor receives left broadcast");

    println!("{}", "Scenario complete".green().bold());
}

async fn expect_text<S>(read: &mut S, what: &str) -> serde_json::Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match timeout(Duration::from_secs(2), read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return serde_json::from_str(&text).unwrap_or_default();
            }
            Ok(Some(Ok(_))) => continue,
            _ => panic!("timeout waiting for {}", what),
        }
    }
}

fn assert_step(ok: bool, step: &str) {
    if ok {
        println!("  {} {}", "✓".green(), step);
    } else {
        println!("  {} {}", "✗".red(), step);
        std::process::exit(1);
    }
}
