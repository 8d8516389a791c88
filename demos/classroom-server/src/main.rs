use std::sync::Arc;

use classforge::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Demo data
// ---------------------------------------------------------------------------

const DEMO_ROOM: &str = "demo01";

/// Bearer tokens for the seeded accounts.
struct DemoTokens {
    teacher: String,
    students: Vec<(String, String)>,
}

/// One teacher owning room `demo01`, with two students already joined.
async fn seed(store: &MemoryStore) -> Result<DemoTokens, StoreError> {
    let (teacher, teacher_token) = store
        .register_user(NewUser {
            username: "ms-frizzle".into(),
            email: "frizzle@school.test".into(),
            role: Role::Teacher,
        })
        .await?;
    store
        .create_room(teacher.id, NewRoom {
            name: "Demo classroom".into(),
            meeting_id: Some(DEMO_ROOM.into()),
            description: Some("Seeded by classroom-server".into()),
        })
        .await?;

    let mut students = Vec::new();
    for name in ["arnold", "wanda"] {
        let (student, token) = store
            .register_user(NewUser {
                username: name.into(),
                email: format!("{name}@school.test"),
                role: Role::Student,
            })
            .await?;
        store.join_room(DEMO_ROOM, student.id).await?;
        students.push((student.username, token));
    }

    Ok(DemoTokens {
        teacher: teacher_token,
        students,
    })
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

fn config_from_env() -> ServerConfig {
    let mut config = ServerConfig {
        bind_addr: "0.0.0.0:8000".into(),
        ..ServerConfig::default()
    };
    if let Ok(addr) = std::env::var("CLASSFORGE_BIND") {
        config.bind_addr = addr;
    }
    if let Ok(flag) = std::env::var("CLASSFORGE_PERSIST_DATA") {
        config.persist_data_frames = matches!(flag.as_str(), "1" | "true" | "yes");
    }
    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = Arc::new(MemoryStore::new());
    let tokens = seed(&store).await?;

    let config = config_from_env();
    let server = ClassforgeServer::builder()
        .config(config)
        .build(StoreAuthenticator::new(Arc::clone(&store)), store)
        .await?;
    let addr = server.local_addr()?;

    tracing::info!(%addr, room = DEMO_ROOM, "classroom ready");
    tracing::info!("teacher: ws://{addr}/ws/room/{DEMO_ROOM}/?token={}", tokens.teacher);
    for (name, token) in &tokens.students {
        tracing::info!("{name}: ws://{addr}/ws/room/{DEMO_ROOM}/?token={token}");
    }

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
