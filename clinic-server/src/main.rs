//! 诊所管理系统服务器主程序

use clap::Parser;
use clinic_database::{DatabasePool, DatabaseQueries};
use clinic_storage::StorageManager;
use clinic_web::{auth, AppState, SessionStore, WebServer};
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::ClinicConfig;

/// 诊所服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "clinic-server")]
#[command(about = "诊所管理系统 (Clinic Management System) 服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听端口（覆盖配置）
    #[arg(short, long)]
    port: Option<u16>,

    /// 数据库连接串（覆盖配置）
    #[arg(short, long)]
    database_url: Option<String>,

    /// 影像文件存储目录（覆盖配置）
    #[arg(short, long)]
    uploads_dir: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .init();

    info!("启动诊所管理系统服务器...");

    let mut config = ClinicConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database.url = database_url;
    }
    if let Some(uploads_dir) = args.uploads_dir {
        config.storage.uploads_dir = uploads_dir;
    }

    info!("服务器配置:");
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  存储目录: {}", config.storage.uploads_dir);

    // 连接数据库并初始化表结构
    let db = DatabasePool::connect(&config.database.url, config.database.max_connections).await?;
    {
        let queries = DatabaseQueries::new(&db);
        queries.create_tables().await?;

        // 首次启动时创建默认管理员，默认口令应在首次登录后修改
        let password_hash = auth::hash_password("admin")?;
        queries.ensure_default_admin(&password_hash).await?;
    }

    let state = AppState {
        db,
        sessions: SessionStore::new(),
        storage: StorageManager::new(&config.storage.uploads_dir),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let server = WebServer::new(addr, state);

    // 启动服务器
    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e.into());
    }

    Ok(())
}
