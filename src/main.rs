use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use auto_apply::browser::{connect_to_browser_and_page, launch_headless_browser};
use auto_apply::config::Config;
use auto_apply::infrastructure::JsExecutor;
use auto_apply::models::{load_profile, EventBody, RequestId, SessionState};
use auto_apply::services::{
    BrowserPageService, FolderJobSource, HumanInput, LlmAnswerService, WarnWriter,
};
use auto_apply::utils::{self, append_log_line, init_log_file};
use auto_apply::SessionController;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    utils::init();

    // 加载配置：CONFIG_PATH 指向 TOML 文件，否则只读环境变量
    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => Config::from_toml_file(path)?,
        Err(_) => Config::from_env()?,
    };
    init_log_file(&config.output_log_file)?;

    // 浏览器由 main 持有，生命周期覆盖整个会话
    let (_browser, page) = if config.headless {
        launch_headless_browser(config.chrome_executable.as_deref()).await?
    } else {
        connect_to_browser_and_page(config.browser_debug_port, None, None).await?
    };

    let profile = load_profile(Path::new(&config.profile_path)).await?;
    let answers = Arc::new(LlmAnswerService::new(&config, profile));
    let page_service = Arc::new(BrowserPageService::new(JsExecutor::new(page)));
    let controller = SessionController::with_warn_writer(
        answers,
        page_service,
        config.event_buffer,
        WarnWriter::with_path(&config.warn_file),
    );

    // 事件流以 JSON 行输出到 stdout，日志事件同时写入日志文件
    let mut events = controller.subscribe();
    let log_file = config.output_log_file.clone();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("事件序列化失败: {}", e),
            }
            match &event.body {
                EventBody::Log { level, message, .. } => {
                    let line = format!(
                        "{} [{:?}] {}",
                        event.timestamp.format("%H:%M:%S"),
                        level,
                        message
                    );
                    if let Err(e) = append_log_line(&log_file, &line) {
                        warn!("写入日志文件失败: {}", e);
                    }
                }
                // 最后一个统计事件之后会话不再发布事件
                EventBody::Stats(stats)
                    if matches!(
                        stats.state,
                        SessionState::Completed | SessionState::Stopped | SessionState::Failed
                    ) =>
                {
                    break;
                }
                _ => {}
            }
        }
    });

    let session_id = controller.start_with_source(
        Box::new(FolderJobSource::new(config.jobs_folder.clone())),
        config.session_config(),
    )?;
    info!("会话 {} 已启动，输入 help 查看命令", session_id);

    let console = tokio::spawn(run_console(controller.clone()));

    let final_state = controller.join().await;
    if let Err(e) = printer.await {
        error!("事件输出任务异常退出: {}", e);
    }
    console.abort();

    info!("会话结束: {:?}", final_state);
    Ok(())
}

/// 从 stdin 读取操作员命令
async fn run_console(controller: SessionController) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let result: Result<()> = match command {
            "status" => serde_json::to_string_pretty(&controller.status())
                .map(|s| eprintln!("{}", s))
                .map_err(Into::into),
            "pause" => controller.pause().map_err(Into::into),
            "resume" => controller.resume().map_err(Into::into),
            "stop" => controller.stop().map_err(Into::into),
            "pending" => {
                for request in controller.pending_interrupts() {
                    eprintln!("{} | {}", request.id, request.prompt);
                }
                Ok(())
            }
            "answer" => match rest.split_once(' ') {
                Some((id, value)) => controller
                    .resolve_interrupt(
                        &RequestId::from(id),
                        HumanInput::Value(value.trim().to_string()),
                    )
                    .map_err(Into::into),
                None => Err(anyhow::anyhow!("用法: answer <id> <value>")),
            },
            "skip" if !rest.is_empty() => controller
                .resolve_interrupt(&RequestId::from(rest), HumanInput::Skip)
                .map_err(Into::into),
            "help" => {
                eprintln!(
                    "命令: status | pause | resume | stop | pending | answer <id> <value> | skip <id>"
                );
                Ok(())
            }
            _ => Err(anyhow::anyhow!("未知命令: {}", line)),
        };

        if let Err(e) = result {
            warn!("❌ {}", e);
        }
    }
}
