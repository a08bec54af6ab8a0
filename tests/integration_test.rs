use std::path::Path;
use std::sync::Arc;

use auto_apply::browser::connect_to_browser_and_page;
use auto_apply::config::Config;
use auto_apply::infrastructure::JsExecutor;
use auto_apply::models::{load_job_file, load_profile, SessionState};
use auto_apply::services::{BrowserPageService, LlmAnswerService};
use auto_apply::utils;
use auto_apply::SessionController;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_dry_run_single_job_file() {
    // 初始化日志
    utils::init();

    // 加载配置
    let mut config = Config::from_env().expect("配置加载失败");
    config.dry_run = true;

    // 连接浏览器
    let (_browser, page) = connect_to_browser_and_page(config.browser_debug_port, None, None)
        .await
        .expect("连接浏览器失败");

    // 注意：请根据实际情况修改文件路径
    let jobs = load_job_file(Path::new("data/jobs/sample.toml"))
        .await
        .expect("加载职位文件失败");
    let profile = load_profile(Path::new(&config.profile_path))
        .await
        .expect("加载个人资料失败");

    let controller = SessionController::new(
        Arc::new(LlmAnswerService::new(&config, profile)),
        Arc::new(BrowserPageService::new(JsExecutor::new(page))),
        config.event_buffer,
    );
    controller
        .start(jobs, config.session_config())
        .expect("会话启动失败");

    assert_eq!(controller.join().await, Some(SessionState::Completed));
}

#[tokio::test]
#[ignore]
async fn test_browser_connection() {
    // 初始化日志
    utils::init();

    // 加载配置
    let config = Config::from_env().expect("配置加载失败");

    // 测试浏览器连接
    let result = connect_to_browser_and_page(config.browser_debug_port, None, None).await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}
