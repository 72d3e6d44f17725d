use clap::Parser;
use promptgate::config::Config;
use promptgate::pipeline::AppState;
use promptgate::server;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "promptgate")]
#[command(about = "轻量级提示词转发网关", long_about = None)]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "promptgate.yaml")]
    config: String,

    /// 监听地址
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // 解析命令行参数
    let args = Args::parse();

    // 加载配置
    let config = Config::from_file(&args.config)?;
    let state = Arc::new(AppState::new(Arc::new(config)));

    // 解析监听地址
    let addr: SocketAddr = args.bind.parse()?;

    // 启动服务器
    server::start_server(state, addr).await?;

    Ok(())
}
