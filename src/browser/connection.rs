use anyhow::{Context, Result};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info};

/// 连接到已打开的浏览器并获取页面
///
/// # 参数
/// - `port`: 浏览器远程调试端口
/// - `start_url`: 新建页面时打开的地址（None 则为空白页）
/// - `target_title`: 优先复用标题包含该文本的已有页面
pub async fn connect_to_browser_and_page(
    port: u16,
    start_url: Option<&str>,
    target_title: Option<&str>,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url)
        .await
        .with_context(|| format!("无法连接到浏览器 (端口: {})", port))?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    if let Some(title) = target_title {
        let pages = browser.pages().await?;
        debug!("获取到 {} 个页面，查找标题包含 '{}' 的页面", pages.len(), title);
        for p in pages.iter() {
            if let Ok(Some(page_title)) = p.get_title().await {
                if page_title.contains(title) {
                    info!("✓ 复用已有页面: {}", page_title);
                    return Ok((browser, p.clone()));
                }
            }
        }
    }

    let page = browser
        .new_page(start_url.unwrap_or("about:blank"))
        .await
        .context("创建新页面失败")?;
    info!("✓ 已创建页面: {}", start_url.unwrap_or("about:blank"));

    Ok((browser, page))
}
