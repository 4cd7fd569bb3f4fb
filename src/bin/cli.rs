// CodeShare CLI validation tool
// Joins mentoring rooms as a thin client and validates server behavior
// through automated scenarios and interactive commands

use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::io::{self, Write as _};
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Solution text of the built-in "array-methods" exercise, used by the
/// solved-flag scenario. Only valid against the default catalog.
const ARRAY_METHODS_SOLUTION: &str =
    "const numbers = [1, 2, 3, 4, 5];\nconst evenNumbers = numbers.filter(num => num % 2 === 0);";

#[derive(Parser)]
#[command(name = "codeshare-cli")]
#[command(about = "CodeShare room client and validation tool", long_about = None)]
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

    /// List available code blocks
    Blocks,

    /// Show one code block
    Show {
        /// Code block ID
        id: String,
    },

    /// Join a room and mirror it live; as mentor, stdin lines become edits
    Join {
        /// Code block ID to join
        block: String,
    },

    /// Run automated validation scenarios
    Validate {
        /// Run all validation tests
        #[arg(short, long)]
        all: bool,

        /// Test specific scenario
        #[arg(long)]
        scenario: Option<String>,
    },

    /// Interactive mode - send custom events
    Interactive,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => {
            check_health(&cli.server).await;
        }
        Commands::Blocks => {
            list_blocks(&cli.server).await;
        }
        Commands::Show { id } => {
            show_block(&cli.server, id).await;
        }
        Commands::Join { block } => {
            join_room(&cli.server, block).await;
        }
        Commands::Validate { all, scenario } => {
            if *all {
                run_all_validations(&cli.server).await;
            } else if let Some(s) = scenario {
                run_scenario(&cli.server, s).await;
            } else {
                println!("{}", "Use --all or --scenario <name>".yellow());
                list_scenarios();
            }
        }
        Commands::Interactive => {
            interactive_mode(&cli.server).await;
        }
    }
}

fn ws_url(server: &str) -> String {
    format!("ws://{}/ws", server)
}

/// Local mirror of the room, the way the browser client keeps one.
/// Echo suppression lives here: a code_update whose sender matches our
/// own session id leaves the buffer alone but still applies the solved
/// flag.
struct RoomView {
    session_id: String,
    code: String,
    is_mentor: bool,
    is_solved: bool,
    student_count: u64,
    mentor_left: bool,
}

impl RoomView {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            code: String::new(),
            is_mentor: false,
            is_solved: false,
            student_count: 0,
            mentor_left: false,
        }
    }

    /// Local edit, applied before the change is emitted
    fn edit(&mut self, code: String) {
        self.code = code;
    }

    fn apply(&mut self, event: &Value) {
        match event["type"].as_str() {
            Some("role_assigned") => {
                self.is_mentor = event["isMentor"].as_bool().unwrap_or(false);
            }
            Some("room_update") => {
                self.student_count = event["studentCount"].as_u64().unwrap_or(0);
            }
            Some("code_update") => {
                self.is_solved = event["isSolved"].as_bool().unwrap_or(false);
                let sender = event["sender"].as_str().unwrap_or("");
                if sender != self.session_id {
                    if let Some(code) = event["code"].as_str() {
                        self.code = code.to_string();
                    }
                }
            }
            Some("mentor_left") => {
                self.mentor_left = true;
            }
            _ => {}
        }
    }
}

/// Read the next text event, skipping pings and other non-text frames
async fn next_event(read: &mut WsRead, wait: Duration) -> Option<Value> {
    loop {
        match timeout(wait, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    return Some(value);
                }
            }
            Ok(Some(Ok(Message::Close(_)))) => return None,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) | Ok(None) | Err(_) => return None,
        }
    }
}

/// Read events until one of the given type arrives
async fn next_event_of(read: &mut WsRead, event_type: &str, wait: Duration) -> Option<Value> {
    loop {
        let event = next_event(read, wait).await?;
        if event["type"] == event_type {
            return Some(event);
        }
    }
}

struct JoinedClient {
    write: WsWrite,
    read: WsRead,
    session_id: String,
    is_mentor: bool,
}

/// Connect, take the connected handshake, join a room, and wait for the
/// role assignment
async fn connect_and_join(server: &str, block: &str) -> Option<JoinedClient> {
    let (ws_stream, _) = match connect_async(&ws_url(server)).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            return None;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    let connected = next_event_of(&mut read, "connected", Duration::from_secs(3)).await?;
    let session_id = connected["sessionId"].as_str()?.to_string();

    let join = json!({ "type": "join_room", "room": block });
    if write.send(Message::Text(join.to_string())).await.is_err() {
        println!("{} Failed to send join_room", "✗".red());
        return None;
    }

    // role_assigned or room_not_found decides the outcome
    loop {
        let event = next_event(&mut read, Duration::from_secs(3)).await?;
        match event["type"].as_str() {
            Some("role_assigned") => {
                return Some(JoinedClient {
                    write,
                    read,
                    session_id,
                    is_mentor: event["isMentor"].as_bool().unwrap_or(false),
                });
            }
            Some("room_not_found") => {
                println!("{} {}", "✗".red(), event["message"]);
                return None;
            }
            _ => continue,
        }
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

                if let Ok(body) = resp.json::<Value>().await {
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

async fn list_blocks(server: &str) {
    println!("{}", "Fetching code blocks...".cyan());

    let url = format!("http://{}/api/codeblocks", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            if !resp.status().is_success() {
                println!("{} Listing failed: {}", "✗".red(), resp.status());
                return;
            }
            match resp.json::<Value>().await {
                Ok(body) => {
                    let blocks = body.as_array().cloned().unwrap_or_default();
                    println!("{} {} code block(s) available\n", "✓".green(), blocks.len());
                    for block in blocks {
                        println!(
                            "  {}  {}",
                            block["id"].as_str().unwrap_or("?").cyan(),
                            block["title"].as_str().unwrap_or("?")
                        );
                    }
                }
                Err(e) => println!("{} Could not parse listing: {}", "✗".red(), e),
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

async fn show_block(server: &str, id: &str) {
    let url = format!("http://{}/api/codeblocks/{}", server, id);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            if resp.status().as_u16() == 404 {
                println!("{} No code block with id {}", "✗".red(), id);
                return;
            }
            match resp.json::<Value>().await {
                Ok(body) => {
                    println!("{}", body["title"].as_str().unwrap_or("?").bold());
                    if let Some(explanation) = body["explanation"].as_str() {
                        println!("{}", explanation.dimmed());
                    }
                    println!("{}", "─".repeat(50));
                    println!("{}", body["code"].as_str().unwrap_or(""));
                }
                Err(e) => println!("{} Could not parse block: {}", "✗".red(), e),
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

async fn join_room(server: &str, block: &str) {
    println!("{}", "Joining room...".cyan());
    println!("  Block: {}", block);

    let Some(client) = connect_and_join(server, block).await else {
        return;
    };
    let JoinedClient {
        mut write,
        mut read,
        session_id,
        is_mentor,
    } = client;

    let mut view = RoomView::new(session_id.clone());
    view.is_mentor = is_mentor;

    if is_mentor {
        println!(
            "{} Joined as {}. Type lines to edit the shared code.",
            "✓".green(),
            "mentor".green().bold()
        );
    } else {
        println!(
            "{} Joined as {}. This is a read-only mirror.",
            "✓".green(),
            "student".cyan().bold()
        );
    }
    println!("Press {} to leave.\n", "Ctrl+C".bold());

    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let room = block.to_string();

    loop {
        tokio::select! {
            event = next_event(&mut read, Duration::from_secs(3600)) => {
                let Some(event) = event else {
                    println!("{} Connection closed by server", "✗".yellow());
                    break;
                };
                let was_solved = view.is_solved;
                view.apply(&event);

                match event["type"].as_str() {
                    Some("room_update") => {
                        println!("{} Students in room: {}", "◀".green(), view.student_count);
                    }
                    Some("code_update") => {
                        let sender = event["sender"].as_str().unwrap_or("");
                        if sender != session_id {
                            println!("{} Code updated:", "◀".green());
                            println!("{}", view.code.bright_white());
                        }
                        if view.is_solved && !was_solved {
                            println!("{}", "Great job! The solution is correct!".green().bold());
                        }
                    }
                    Some("mentor_left") => {
                        println!("{} The mentor left; room dissolved.", "✗".yellow());
                        break;
                    }
                    Some("error") => {
                        println!("{} {}", "✗".red(), event["message"]);
                    }
                    _ => {}
                }
            }
            line = stdin.next_line() => {
                let Ok(Some(line)) = line else { break };
                if !view.is_mentor {
                    println!("{} Students cannot edit; input ignored.", "○".yellow());
                    continue;
                }

                let code = if view.code.is_empty() {
                    line
                } else {
                    format!("{}\n{}", view.code, line)
                };
                view.edit(code.clone());

                let event = json!({
                    "type": "code_change",
                    "room": room,
                    "code": code,
                    "sender": session_id,
                });
                if write.send(Message::Text(event.to_string())).await.is_err() {
                    println!("{} Failed to send edit", "✗".red());
                    break;
                }
            }
        }
    }
}

fn list_scenarios() {
    println!("\n{}", "Available Validation Scenarios:".bold());
    println!("  {} - WebSocket connect and handshake", "connection".cyan());
    println!("  {} - Catalog listing endpoint", "list-blocks".cyan());
    println!("  {} - Mentor/student role assignment", "join-room".cyan());
    println!("  {} - Edit fan-out with sender tagging", "echo-suppression".cyan());
    println!("  {} - Room dissolution on mentor exit", "mentor-left".cyan());
    println!("  {} - Unknown room rejection", "invalid-room".cyan());
    println!("  {} - Solved flag detection", "solved-flag".cyan());
    println!("  {} - Long-poll fallback transport", "polling".cyan());
    println!("\nExample: codeshare-cli validate --scenario connection");
}

async fn run_scenario(server: &str, scenario: &str) {
    println!("\n{} {}", "Running scenario:".bold(), scenario.cyan());
    println!("{}", "─".repeat(60));

    let result = dispatch_scenario(server, scenario).await;

    match result {
        Some(true) => println!("\n{} Scenario passed", "✓".green().bold()),
        Some(false) => println!("\n{} Scenario failed", "✗".red().bold()),
        None => {
            println!("{} Unknown scenario: {}", "✗".red(), scenario);
            list_scenarios();
        }
    }
}

async fn dispatch_scenario(server: &str, scenario: &str) -> Option<bool> {
    let result = match scenario {
        "connection" => validate_connection(server).await,
        "list-blocks" => validate_list_blocks(server).await,
        "join-room" => validate_join_room(server).await,
        "echo-suppression" => validate_echo_suppression(server).await,
        "mentor-left" => validate_mentor_left(server).await,
        "invalid-room" => validate_invalid_room(server).await,
        "solved-flag" => validate_solved_flag(server).await,
        "polling" => validate_polling(server).await,
        _ => return None,
    };
    Some(result)
}

async fn run_all_validations(server: &str) {
    println!("\n{}", "Running All Validation Tests".bold().green());
    println!("{}\n", "═".repeat(60).green());

    let scenarios = vec![
        "connection",
        "list-blocks",
        "join-room",
        "echo-suppression",
        "mentor-left",
        "invalid-room",
        "solved-flag",
        "polling",
    ];

    let mut passed = 0;
    let mut failed = 0;

    for scenario in scenarios {
        println!("\n{} Testing: {}", "▶".cyan(), scenario.bold());
        println!("{}", "─".repeat(60));

        if dispatch_scenario(server, scenario).await == Some(true) {
            passed += 1;
        } else {
            failed += 1;
        }

        sleep(Duration::from_millis(200)).await;
    }

    println!("\n{}", "═".repeat(60).green());
    println!("{}", "Validation Summary".bold());
    println!("{}", "═".repeat(60).green());
    println!("  {} Passed: {}", "✓".green(), passed.to_string().green());
    println!("  {} Failed: {}", "✗".red(), failed.to_string().red());
    println!("  Total: {}", passed + failed);

    if failed == 0 {
        println!("\n{}", "All validations passed!".green().bold());
    } else {
        println!("\n{}", "Some validations failed. Check output above.".yellow());
    }
}

/// First block id from the catalog, used by scenarios that need a real room
async fn first_block_id(server: &str) -> Option<String> {
    let url = format!("http://{}/api/codeblocks", server);
    let body = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .ok()?
        .json::<Value>()
        .await
        .ok()?;
    body.as_array()?
        .first()?
        .get("id")?
        .as_str()
        .map(String::from)
}

async fn validate_connection(server: &str) -> bool {
    match connect_async(&ws_url(server)).await {
        Ok((ws_stream, _)) => {
            let (_, mut read) = ws_stream.split();
            match next_event_of(&mut read, "connected", Duration::from_secs(3)).await {
                Some(event) if event["sessionId"].is_string() => {
                    println!(
                        "{} Connected, session {}",
                        "✓".green(),
                        event["sessionId"].as_str().unwrap_or("?")
                    );
                    true
                }
                _ => {
                    println!("{} No connected handshake received", "✗".red());
                    false
                }
            }
        }
        Err(e) => {
            println!("{} Connection failed: {}", "✗".red(), e);
            false
        }
    }
}

async fn validate_list_blocks(server: &str) -> bool {
    let url = format!("http://{}/api/codeblocks", server);

    match reqwest::Client::new().get(&url).send().await {
        Ok(resp) => {
            if !resp.status().is_success() {
                println!("{} Listing returned {}", "✗".red(), resp.status());
                return false;
            }
            match resp.json::<Value>().await {
                Ok(body) => match body.as_array() {
                    Some(blocks) if !blocks.is_empty() => {
                        let well_formed = blocks
                            .iter()
                            .all(|b| b["id"].is_string() && b["title"].is_string());
                        if well_formed {
                            println!("{} {} blocks listed", "✓".green(), blocks.len());
                        } else {
                            println!("{} Listing entries missing id/title", "✗".red());
                        }
                        well_formed
                    }
                    _ => {
                        println!("{} Listing is empty", "✗".red());
                        false
                    }
                },
                Err(e) => {
                    println!("{} Could not parse listing: {}", "✗".red(), e);
                    false
                }
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            false
        }
    }
}

async fn validate_join_room(server: &str) -> bool {
    let Some(block) = first_block_id(server).await else {
        println!("{} Could not fetch a block id", "✗".red());
        return false;
    };
    println!("  Using block: {}", block);

    let Some(mentor) = connect_and_join(server, &block).await else {
        return false;
    };
    if !mentor.is_mentor {
        println!("{} First joiner was not assigned mentor", "✗".red());
        return false;
    }
    println!("  {} First joiner is mentor", "✓".green());

    let Some(student) = connect_and_join(server, &block).await else {
        return false;
    };
    if student.is_mentor {
        println!("{} Second joiner was assigned mentor", "✗".red());
        return false;
    }
    println!("  {} Second joiner is student", "✓".green());

    let mut mentor = mentor;
    let Some(update) = next_event_of(&mut mentor.read, "room_update", Duration::from_secs(3)).await
    else {
        println!("{} Mentor never saw a room_update", "✗".red());
        return false;
    };
    if update["studentCount"].as_u64() != Some(1) {
        // the mentor's own join broadcast a count of 0 first
        let Some(update) =
            next_event_of(&mut mentor.read, "room_update", Duration::from_secs(3)).await
        else {
            println!("{} Mentor never saw the student count", "✗".red());
            return false;
        };
        if update["studentCount"].as_u64() != Some(1) {
            println!("{} Expected studentCount 1, got {}", "✗".red(), update);
            return false;
        }
    }
    println!("  {} Membership count broadcast to the room", "✓".green());
    true
}

async fn validate_echo_suppression(server: &str) -> bool {
    let Some(block) = first_block_id(server).await else {
        println!("{} Could not fetch a block id", "✗".red());
        return false;
    };

    let Some(mut mentor) = connect_and_join(server, &block).await else {
        return false;
    };
    let Some(mut student) = connect_and_join(server, &block).await else {
        return false;
    };

    let mut mentor_view = RoomView::new(mentor.session_id.clone());
    let mut student_view = RoomView::new(student.session_id.clone());

    let code = "let x = 2;";
    mentor_view.edit(code.to_string());
    let event = json!({
        "type": "code_change",
        "room": block,
        "code": code,
        "sender": mentor.session_id,
    });
    if mentor.write.send(Message::Text(event.to_string())).await.is_err() {
        println!("{} Failed to send code change", "✗".red());
        return false;
    }

    // the student applies the remote edit
    let Some(update) =
        next_event_of(&mut student.read, "code_update", Duration::from_secs(3)).await
    else {
        println!("{} Student never received code_update", "✗".red());
        return false;
    };
    // skip the join snapshot if it raced ahead of the edit
    let update = if update["sender"] == "server" {
        match next_event_of(&mut student.read, "code_update", Duration::from_secs(3)).await {
            Some(update) => update,
            None => {
                println!("{} Student never received the edit", "✗".red());
                return false;
            }
        }
    } else {
        update
    };
    student_view.apply(&update);
    if student_view.code != code {
        println!("{} Student buffer did not take the edit", "✗".red());
        return false;
    }
    println!("  {} Student mirror updated", "✓".green());

    // the mentor receives its own echo, tagged with its session id
    let Some(echo) = next_event_of(&mut mentor.read, "code_update", Duration::from_secs(3)).await
    else {
        println!("{} Mentor never received the echo", "✗".red());
        return false;
    };
    let echo = if echo["sender"] == "server" {
        match next_event_of(&mut mentor.read, "code_update", Duration::from_secs(3)).await {
            Some(echo) => echo,
            None => {
                println!("{} Mentor never received the echo", "✗".red());
                return false;
            }
        }
    } else {
        echo
    };
    if echo["sender"].as_str() != Some(mentor.session_id.as_str()) {
        println!("{} Echo not tagged with the sender identity", "✗".red());
        return false;
    }
    mentor_view.apply(&echo);
    if mentor_view.code != code {
        println!("{} Mentor buffer was clobbered by its own echo", "✗".red());
        return false;
    }
    println!("  {} Echo tagged with sender and suppressed locally", "✓".green());
    true
}

async fn validate_mentor_left(server: &str) -> bool {
    let Some(block) = first_block_id(server).await else {
        println!("{} Could not fetch a block id", "✗".red());
        return false;
    };

    let Some(mentor) = connect_and_join(server, &block).await else {
        return false;
    };
    let Some(mut student) = connect_and_join(server, &block).await else {
        return false;
    };

    println!("  Dropping mentor connection...");
    drop(mentor.write);
    drop(mentor.read);

    match next_event_of(&mut student.read, "mentor_left", Duration::from_secs(5)).await {
        Some(_) => {
            println!("{} Student was told the mentor left", "✓".green());
            true
        }
        None => {
            println!("{} No mentor_left within 5s", "✗".red());
            false
        }
    }
}

async fn validate_invalid_room(server: &str) -> bool {
    println!("  Attempting to join non-existent room...");

    let (ws_stream, _) = match connect_async(&ws_url(server)).await {
        Ok(conn) => conn,
        Err(e) => {
            println!("{} Connection failed: {}", "✗".red(), e);
            return false;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    if next_event_of(&mut read, "connected", Duration::from_secs(3))
        .await
        .is_none()
    {
        println!("{} No connected handshake", "✗".red());
        return false;
    }

    let join = json!({ "type": "join_room", "room": "does-not-exist" });
    if write.send(Message::Text(join.to_string())).await.is_err() {
        println!("{} Failed to send join_room", "✗".red());
        return false;
    }

    match next_event_of(&mut read, "room_not_found", Duration::from_secs(3)).await {
        Some(event) => {
            println!("{} Rejected: {}", "✓".green(), event["message"]);
            true
        }
        None => {
            println!("{} No room_not_found received", "✗".red());
            false
        }
    }
}

async fn validate_solved_flag(server: &str) -> bool {
    println!("  Note: requires the built-in catalog (array-methods block)");

    let Some(mut mentor) = connect_and_join(server, "array-methods").await else {
        return false;
    };

    // drain the join snapshot so the next code_update is ours
    let _ = next_event_of(&mut mentor.read, "code_update", Duration::from_secs(3)).await;

    let event = json!({
        "type": "code_change",
        "room": "array-methods",
        "code": ARRAY_METHODS_SOLUTION,
        "sender": mentor.session_id,
    });
    if mentor.write.send(Message::Text(event.to_string())).await.is_err() {
        println!("{} Failed to send solution", "✗".red());
        return false;
    }
    let Some(update) = next_event_of(&mut mentor.read, "code_update", Duration::from_secs(3)).await
    else {
        println!("{} No code_update for the solution", "✗".red());
        return false;
    };
    if update["isSolved"].as_bool() != Some(true) {
        println!("{} Solution was not detected as solved", "✗".red());
        return false;
    }
    println!("  {} Solution detected, isSolved = true", "✓".green());

    let event = json!({
        "type": "code_change",
        "room": "array-methods",
        "code": "// back to the drawing board",
        "sender": mentor.session_id,
    });
    if mentor.write.send(Message::Text(event.to_string())).await.is_err() {
        println!("{} Failed to send follow-up edit", "✗".red());
        return false;
    }
    let Some(update) = next_event_of(&mut mentor.read, "code_update", Duration::from_secs(3)).await
    else {
        println!("{} No code_update for the follow-up edit", "✗".red());
        return false;
    };
    if update["isSolved"].as_bool() != Some(false) {
        println!("{} Solved flag was sticky", "✗".red());
        return false;
    }
    println!("  {} Solved flag reverted on the next edit", "✓".green());
    true
}

async fn validate_polling(server: &str) -> bool {
    let Some(block) = first_block_id(server).await else {
        println!("{} Could not fetch a block id", "✗".red());
        return false;
    };

    let client = reqwest::Client::new();
    let base = format!("http://{}/poll", server);

    // handshake
    let session_id = match client.post(&base).send().await {
        Ok(resp) => match resp.json::<Value>().await {
            Ok(body) => match body["sessionId"].as_str() {
                Some(id) => id.to_string(),
                None => {
                    println!("{} Handshake carried no sessionId", "✗".red());
                    return false;
                }
            },
            Err(e) => {
                println!("{} Could not parse handshake: {}", "✗".red(), e);
                return false;
            }
        },
        Err(e) => {
            println!("{} Handshake failed: {}", "✗".red(), e);
            return false;
        }
    };
    println!("  {} Session {}", "✓".green(), session_id);

    // join through the fallback substrate
    let join = json!({ "type": "join_room", "room": block });
    let submit_url = format!("{}/{}", base, session_id);
    match client.post(&submit_url).body(join.to_string()).send().await {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => {
            println!("{} Submit returned {}", "✗".red(), resp.status());
            return false;
        }
        Err(e) => {
            println!("{} Submit failed: {}", "✗".red(), e);
            return false;
        }
    }

    // the long poll drains the join results
    let events = match client.get(&submit_url).send().await {
        Ok(resp) => match resp.json::<Value>().await {
            Ok(body) => body.as_array().cloned().unwrap_or_default(),
            Err(e) => {
                println!("{} Could not parse events: {}", "✗".red(), e);
                return false;
            }
        },
        Err(e) => {
            println!("{} Poll failed: {}", "✗".red(), e);
            return false;
        }
    };

    let got_role = events.iter().any(|e| e["type"] == "role_assigned");
    if got_role {
        println!("{} role_assigned arrived over long-poll", "✓".green());
    } else {
        println!("{} No role_assigned in polled batch: {:?}", "✗".red(), events);
    }

    let _ = client.delete(&submit_url).send().await;
    got_role
}

async fn interactive_mode(server: &str) {
    println!("\n{}", "Interactive Mode".bold().green());
    println!("{}", "═".repeat(60).green());
    println!("Type {} for help, {} to quit\n", "help".cyan(), "quit".cyan());

    match connect_async(&ws_url(server)).await {
        Ok((ws_stream, _)) => {
            println!("{} Connected to server", "✓".green());

            let (mut write, mut read) = ws_stream.split();

            // Spawn task to receive events
            let receive_task = tokio::spawn(async move {
                while let Some(Ok(msg)) = read.next().await {
                    if let Message::Text(text) = msg {
                        println!("\n{} {}", "◀".green(), text.bright_white());
                    }
                }
            });

            // Main input loop
            loop {
                print!("{} ", "►".cyan());
                io::stdout().flush().unwrap();

                let mut input = String::new();
                if io::stdin().read_line(&mut input).is_err() {
                    break;
                }

                let input = input.trim();

                if input.is_empty() {
                    continue;
                }

                if input == "quit" || input == "exit" {
                    println!("Goodbye!");
                    break;
                }

                if input == "help" {
                    print_interactive_help();
                    continue;
                }

                // Try to parse as JSON and send
                if let Ok(parsed) = serde_json::from_str::<Value>(input) {
                    if write.send(Message::Text(parsed.to_string())).await.is_ok() {
                        println!("{} Event sent", "✓".green());
                    } else {
                        println!("{} Failed to send event", "✗".red());
                        break;
                    }
                } else {
                    println!("{} Invalid JSON. Type 'help' for examples.", "✗".yellow());
                }
            }

            receive_task.abort();
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

fn print_interactive_help() {
    println!("\n{}", "Interactive Mode Commands".bold());
    println!("{}", "─".repeat(60));
    println!("Send JSON events directly to the server.\n");

    println!("{}", "Example Events:".bold());
    println!("\n{}:", "Join Room".cyan());
    println!(r#"  {{"type":"join_room","room":"array-methods"}}"#);

    println!("\n{}:", "Code Change".cyan());
    println!(
        r#"  {{"type":"code_change","room":"array-methods","code":"let x = 2;","sender":"<your session id>"}}"#
    );

    println!("\n{}:", "Leave Room".cyan());
    println!(r#"  {{"type":"leave_room"}}"#);

    println!("\n{}: quit, exit", "Commands".bold());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_applies_remote_code_update() {
        let mut view = RoomView::new("me".to_string());
        view.apply(&json!({
            "type": "code_update",
            "code": "let x = 2;",
            "isSolved": false,
            "sender": "someone-else"
        }));
        assert_eq!(view.code, "let x = 2;");
        assert!(!view.is_solved);
    }

    #[test]
    fn test_view_suppresses_own_echo_but_applies_solved() {
        let mut view = RoomView::new("me".to_string());
        view.edit("local buffer".to_string());

        view.apply(&json!({
            "type": "code_update",
            "code": "server copy",
            "isSolved": true,
            "sender": "me"
        }));

        // own echo discarded, solved flag still applied
        assert_eq!(view.code, "local buffer");
        assert!(view.is_solved);
    }

    #[test]
    fn test_view_tracks_role_and_count() {
        let mut view = RoomView::new("me".to_string());
        view.apply(&json!({ "type": "role_assigned", "isMentor": true }));
        view.apply(&json!({ "type": "room_update", "studentCount": 3 }));
        assert!(view.is_mentor);
        assert_eq!(view.student_count, 3);
    }

    #[test]
    fn test_view_flags_mentor_departure() {
        let mut view = RoomView::new("me".to_string());
        view.apply(&json!({ "type": "mentor_left" }));
        assert!(view.mentor_left);
    }

    #[test]
    fn test_view_ignores_unknown_events() {
        let mut view = RoomView::new("me".to_string());
        view.apply(&json!({ "type": "something_new", "data": 1 }));
        assert_eq!(view.code, "");
        assert!(!view.mentor_left);
    }
}
