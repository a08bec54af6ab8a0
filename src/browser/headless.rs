use std::path::Path;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info};

/// 启动无头浏览器并打开一个空白页面
///
/// # 参数
/// - `executable`: 浏览器可执行文件（None 则由 chromiumoxide 自动查找）
pub async fn launch_headless_browser(executable: Option<&str>) -> Result<(Browser, Page)> {
    info!("🚀 启动无头浏览器...");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
    ]);
    if let Some(executable) = executable {
        debug!("浏览器可执行文件: {}", executable);
        builder = builder.chrome_executable(Path::new(executable));
    }
    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("配置无头浏览器失败: {}", e))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| anyhow::anyhow!("启动无头浏览器失败: {}", e))?;

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| anyhow::anyhow!("创建页面失败: {}", e))?;
    info!("✅ 无头浏览器已就绪");

    Ok((browser, page))
}
