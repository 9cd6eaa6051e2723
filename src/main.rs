/*
 * Responsibility
 * - tokio runtime 起動
 * - app::run() の呼び出し (ロジックは置かない)
 * - bootstrap の失敗は Err として返り、プロセスは非ゼロで終了する
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tag_service::app::run().await
}
