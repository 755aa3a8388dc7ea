//! Chips Wiring 命令行入口
//!
//! 模块连线内省层的命令行工具，从注册表描述文件加载连线图并输出 JSON 快照。
//!
//! # 命令概览
//!
//! - `closure` - 连线闭包快照
//! - `wiring` - 连线快照（不展开闭包）
//! - `capabilities` - 声明的能力
//! - `requirements` - 声明的需求
//! - `encode` - 编码单个属性值
//! - `decode` - 解码单个属性值
//! - `check-config` - 验证配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 模块 2 当前修订版本在 pkg 命名空间下的连线闭包
//! chips-wiring -r registry.yaml closure -m 2 -n pkg
//!
//! # 模块 1 所有修订版本的连线
//! chips-wiring -r registry.yaml wiring -m 1 --all-revisions
//!
//! # 编解码
//! chips-wiring encode -k sizes -v '[1, 2, 3]'
//! chips-wiring decode -v 1,2,3 -t 'Array of int'
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use chips_wiring::{
    decode, encode, CoreError, Logger, LoggerConfig, ModuleRegistry, RegistryParser,
    TypedValue, WiringConfig, WiringIntrospector, ALL_NAMESPACES,
};

/// Chips Wiring - 模块连线内省工具
#[derive(Parser)]
#[command(name = "chips-wiring")]
#[command(version, about = "模块连线图内省工具", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "wiring.yaml", global = true)]
    config: PathBuf,

    /// 注册表描述文件（覆盖配置中的 registry.source）
    #[arg(short, long, global = true)]
    registry: Option<PathBuf>,

    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 查询目标
#[derive(Args, Debug, Clone)]
struct Target {
    /// 模块标识
    #[arg(short, long)]
    module: u64,

    /// 命名空间，"*" 表示全部
    #[arg(short, long, default_value = ALL_NAMESPACES)]
    namespace: String,

    /// 查询模块的所有修订版本，而不仅是当前修订版本
    #[arg(short, long)]
    all_revisions: bool,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 连线闭包快照
    ///
    /// 从模块的当前修订版本（或所有修订版本）出发，输出经命名空间过滤后可达的全部修订版本。
    Closure(Target),

    /// 连线快照，不展开闭包
    Wiring(Target),

    /// 声明的能力
    Capabilities(Target),

    /// 声明的需求
    Requirements(Target),

    /// 编码单个属性值
    ///
    /// 值以 JSON 字面量给出：字符串、整数、浮点数、布尔或标量数组。
    Encode {
        /// 属性键
        #[arg(short, long)]
        key: String,

        /// JSON 格式的值
        #[arg(short, long)]
        value: String,
    },

    /// 解码单个属性值
    Decode {
        /// 编码后的字符串
        #[arg(short, long, allow_hyphen_values = true)]
        value: String,

        /// 类型标签，例如 "Long" 或 "Array of int"
        #[arg(short, long = "type")]
        type_tag: String,
    },

    /// 验证配置文件
    CheckConfig,

    /// 查看版本信息
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("错误: {:#}", e);
        if let Some(core) = e.downcast_ref::<CoreError>() {
            eprintln!("错误码: {} (状态 {})", core.error_code(), core.status_code());
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Version => {
            print_version();
            return Ok(());
        }
        Commands::CheckConfig => return check_config(&cli.config).await,
        _ => {}
    }

    let mut config = load_config(&cli.config).await?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(registry) = cli.registry {
        config.registry.source = Some(registry);
    }

    let _log_guard = Logger::init(LoggerConfig::from_log_config(&config.logging))?;

    match cli.command {
        Commands::Encode { key, value } => {
            let json: serde_json::Value =
                serde_json::from_str(&value).context("值必须是合法的 JSON 字面量")?;
            let encoded = encode(&key, &TypedValue::from_json(&json)?)?;
            print_json(&encoded)
        }
        Commands::Decode { value, type_tag } => {
            let decoded = decode(&value, &type_tag)?;
            debug!(value = ?decoded, "已解码");
            print_json(&encode("value", &decoded)?)
        }
        Commands::Closure(target) => {
            let introspector = open_introspector(&config).await?;
            let snapshot = introspector
                .run_with_timeout(move |i| {
                    if target.all_revisions {
                        i.revisions_wiring_closure(target.module, &target.namespace)
                    } else {
                        i.current_wiring_closure(target.module, &target.namespace)
                    }
                })
                .await?;
            print_json(&snapshot)
        }
        Commands::Wiring(target) => {
            let introspector = open_introspector(&config).await?;
            let snapshot = introspector
                .run_with_timeout(move |i| {
                    if target.all_revisions {
                        i.revisions_wiring(target.module, &target.namespace)
                    } else {
                        i.current_wiring(target.module, &target.namespace)
                    }
                })
                .await?;
            print_json(&snapshot)
        }
        Commands::Capabilities(target) => {
            let introspector = open_introspector(&config).await?;
            if target.all_revisions {
                let records = introspector
                    .run_with_timeout(move |i| {
                        i.revisions_declared_capabilities(target.module, &target.namespace)
                    })
                    .await?;
                print_json(&records)
            } else {
                let records = introspector
                    .run_with_timeout(move |i| {
                        i.current_revision_declared_capabilities(target.module, &target.namespace)
                    })
                    .await?;
                print_json(&records)
            }
        }
        Commands::Requirements(target) => {
            let introspector = open_introspector(&config).await?;
            if target.all_revisions {
                let records = introspector
                    .run_with_timeout(move |i| {
                        i.revisions_declared_requirements(target.module, &target.namespace)
                    })
                    .await?;
                print_json(&records)
            } else {
                let records = introspector
                    .run_with_timeout(move |i| {
                        i.current_revision_declared_requirements(target.module, &target.namespace)
                    })
                    .await?;
                print_json(&records)
            }
        }
        Commands::CheckConfig | Commands::Version => Ok(()),
    }
}

/// 加载配置文件，不存在时使用默认配置
async fn load_config(path: &Path) -> anyhow::Result<WiringConfig> {
    if path.exists() {
        let config = WiringConfig::from_file(path).await?;
        Ok(config)
    } else {
        Ok(WiringConfig::default())
    }
}

/// 加载注册表并创建内省器
async fn open_introspector(
    config: &WiringConfig,
) -> anyhow::Result<WiringIntrospector<ModuleRegistry>> {
    let Some(ref source) = config.registry.source else {
        bail!("未指定注册表描述文件，请使用 -r 或在配置中设置 registry.source");
    };

    let registry = RegistryParser::parse_file(source)
        .await
        .with_context(|| format!("无法加载注册表 {}", source.display()))?;
    info!(source = %source.display(), modules = registry.module_count()?, "已加载注册表");

    Ok(WiringIntrospector::with_config(
        Arc::new(registry),
        config.snapshot.clone(),
    ))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 检查配置文件
async fn check_config(path: &Path) -> anyhow::Result<()> {
    println!("检查配置文件: {}", path.display());
    println!();

    if !path.exists() {
        println!("⚠️  警告: 配置文件不存在，将使用默认配置");
        println!();
        print_config(&WiringConfig::default());
        return Ok(());
    }

    match WiringConfig::from_file(path).await {
        Ok(config) => {
            println!("✅ 配置文件有效！");
            println!();
            print_config(&config);
            Ok(())
        }
        Err(e) => {
            println!("❌ 配置文件无效: {}", e);
            Err(e.into())
        }
    }
}

/// 打印配置内容
fn print_config(config: &WiringConfig) {
    println!("配置内容:");
    println!("────────────────────────────────────────");
    println!("  [快照配置]");
    println!("    失效处理策略:   {:?}", config.snapshot.stale_policy);
    println!("    请求超时:       {} ms", config.snapshot.request_timeout_ms);
    println!();
    println!("  [日志配置]");
    println!("    日志级别:       {}", config.logging.level);
    println!("    文件输出:       {}", if config.logging.file_output { "是" } else { "否" });
    println!("    JSON 格式:      {}", if config.logging.json_format { "是" } else { "否" });
    println!();
    println!("  [注册表]");
    match config.registry.source {
        Some(ref source) => println!("    描述文件:       {}", source.display()),
        None => println!("    描述文件:       (未设置)"),
    }
    println!("────────────────────────────────────────");
}

/// 打印版本信息
fn print_version() {
    println!();
    println!("Chips Wiring - 模块连线内省层");
    println!("═══════════════════════════════════════");
    println!("  版本:             {}", chips_wiring::VERSION);
    println!();
    println!("构建信息:");
    println!("  目标平台:         {}", std::env::consts::ARCH);
    println!("  操作系统:         {}", std::env::consts::OS);
    println!("═══════════════════════════════════════");
    println!();
}
