use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use musim::app::Application;
use musim_config::{AppConfig, ConfigOverrides, LogLevel, OutputFormat};
use musim_domain::WorkloadClass;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("musim")
        .version("1.0.0")
        .about("微服务图模拟节点")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("start")
                .about("启动一个模拟服务节点")
                .arg(
                    Arg::new("name")
                        .value_name("NAME")
                        .help("服务名称，注册到服务发现")
                        .required(true),
                )
                .arg(
                    Arg::new("etcdserver")
                        .short('e')
                        .long("etcdserver")
                        .value_name("URL")
                        .env("ETCD_ADDR")
                        .help("etcd服务地址"),
                )
                .arg(
                    Arg::new("ipaddress")
                        .short('a')
                        .long("ipaddress")
                        .value_name("IP")
                        .env("HostIP")
                        .help("对外公布的IP地址，默认自动探测"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .value_parser(clap::value_parser!(u16))
                        .help("监听端口，默认由系统分配"),
                )
                .arg(
                    Arg::new("workload")
                        .short('w')
                        .long("workload")
                        .value_name("LEVEL")
                        .value_parser(["none", "low", "medium", "heavy"])
                        .help("负载等级"),
                )
                .arg(
                    Arg::new("destination")
                        .short('d')
                        .long("destination")
                        .value_name("SERVICE")
                        .action(ArgAction::Append)
                        .help("下游服务名称，可以重复指定"),
                )
                .arg(
                    Arg::new("metrics-address")
                        .short('m')
                        .long("metrics-address")
                        .value_name("ADDR")
                        .help("Prometheus抓取端点监听地址"),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("配置文件路径"),
                )
                .arg(
                    Arg::new("log-level")
                        .short('l')
                        .long("log-level")
                        .value_name("LEVEL")
                        .value_parser(["trace", "debug", "info", "warn", "error"])
                        .help("日志级别"),
                )
                .arg(
                    Arg::new("log-format")
                        .long("log-format")
                        .value_name("FORMAT")
                        .value_parser(["json", "pretty"])
                        .help("日志格式"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("start", args)) => start(args).await,
        Some((other, _)) => Err(anyhow::anyhow!("不支持的子命令: {other}")),
        None => Err(anyhow::anyhow!("缺少子命令")),
    }
}

async fn start(args: &ArgMatches) -> Result<()> {
    let overrides = parse_overrides(args)?;
    let config_path = args.get_one::<String>("config");

    let config = AppConfig::load(config_path.map(String::as_str), &overrides)
        .context("加载配置失败")?;

    init_logging(config.observability.log_level, config.observability.log_format)?;

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    info!("启动模拟节点 {}，主机: {}", config.node.name, host);
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let app = Application::new(config).await?;
    info!("节点地址: {}", app.address());

    if let Err(e) = app.run(wait_for_shutdown_signal()).await {
        error!("节点运行失败: {e}");
        return Err(e);
    }

    info!("模拟节点已退出");
    Ok(())
}

/// 命令行参数转换为配置覆盖
fn parse_overrides(args: &ArgMatches) -> Result<ConfigOverrides> {
    let workload = args
        .get_one::<String>("workload")
        .map(|w| w.parse::<WorkloadClass>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("无效的负载等级: {e}"))?;
    let log_level = args
        .get_one::<String>("log-level")
        .map(|l| l.parse::<LogLevel>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let log_format = args
        .get_one::<String>("log-format")
        .map(|f| f.parse::<OutputFormat>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(ConfigOverrides {
        name: args.get_one::<String>("name").cloned(),
        discovery_endpoint: args.get_one::<String>("etcdserver").cloned(),
        ip_address: args.get_one::<String>("ipaddress").cloned(),
        port: args.get_one::<u16>("port").copied(),
        workload,
        destinations: args
            .get_many::<String>("destination")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        metrics_address: args.get_one::<String>("metrics-address").cloned(),
        log_level,
        log_format,
    })
}

/// 初始化日志系统
fn init_logging(log_level: LogLevel, log_format: OutputFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        OutputFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        OutputFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
