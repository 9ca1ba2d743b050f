use clap::Parser;
use std::error::Error as _;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use sdbatch::logger::{self, LoggerConfig};
use sdbatch::webui::SdApi;
use sdbatch::{BatchRunner, Config, ImagePersister, SdBatchError, WebUiClient};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "sdbatch")]
#[command(about = "Stable Diffusion WebUI APIを使用した画像生成バッチクライアント")]
#[command(version)]
struct Args {
    /// プロンプト設定ファイル
    #[arg(default_value = "prompts.json")]
    config_file: PathBuf,

    /// 組み込みのサンプルプロンプトで実行
    #[arg(long)]
    sample: bool,

    /// 設定ファイルの検証のみ実行
    #[arg(long)]
    validate_only: bool,

    /// 利用可能なモデルの一覧を表示
    #[arg(long)]
    list_models: bool,

    /// API接続テストを実行
    #[arg(long)]
    check: bool,

    /// 詳細な出力を表示
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let logger_config = if args.verbose {
        LoggerConfig::verbose()
    } else {
        LoggerConfig::default()
    };
    if let Err(e) = logger::init_with_config(logger_config) {
        eprintln!("ロガーの初期化に失敗しました: {}", e);
    }

    match dotenv::dotenv() {
        Ok(_) => log::debug!("✅ .envファイルを読み込みました"),
        Err(_) => log::debug!("⚠️  .envファイルが見つかりません。環境変数を使用します"),
    }

    let config = Config::from_env();

    if args.check {
        run_check(&config).await;
        return;
    }

    if args.list_models {
        list_models(&config).await;
        return;
    }

    let prompts = if args.sample {
        log::info!("サンプルプロンプトを使用します");
        sdbatch::sample_prompts()
    } else {
        match sdbatch::load_prompts(&args.config_file) {
            Ok(prompts) => {
                log::info!("設定ファイル: {}", args.config_file.display());
                log::info!("プロンプト数: {}", prompts.len());
                log::info!("設定ファイルの検証: OK");
                prompts
            }
            Err(e) => fatal(e, args.verbose),
        }
    };

    if args.validate_only {
        log::info!("検証のみ実行しました");
        return;
    }

    let client = match WebUiClient::new(&config) {
        Ok(client) => client,
        Err(e) => fatal(e, args.verbose),
    };
    let persister = ImagePersister::new(&config);
    let runner = BatchRunner::new(client, persister, config.base_url.clone());

    // Stop between items on Ctrl-C; the in-flight request is left to finish.
    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("中断要求を受信しました。現在の項目の完了後に停止します");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    if let Err(e) = runner.run(&prompts).await {
        fatal(e, args.verbose);
    }
}

/// Connection diagnostics against the configured WebUI instance.
async fn run_check(config: &Config) {
    log::info!("=== Stable Diffusion WebUI API 接続テスト ===");
    log::info!("設定情報:");
    log::info!("- WebUI URL: {}", config.base_url);
    log::info!("- API Endpoint: {}", config.api_endpoint);
    log::info!("- 出力ディレクトリ: {}", config.output_dir.display());

    let client = match WebUiClient::new(config) {
        Ok(client) => client,
        Err(e) => fatal(e, false),
    };

    log::info!("API接続チェック中...");
    if !client.check_status().await {
        log::error!("❌ API接続: 失敗");
        log::info!("対処方法:");
        log::info!("1. Stable Diffusion WebUIが起動していることを確認");
        log::info!("2. WebUIが --api オプション付きで起動されていることを確認");
        log::info!("3. ファイアウォール設定を確認");
        log::info!("4. .envファイルのWEBUI_URLが正しいことを確認");
        std::process::exit(1);
    }

    log::info!("✅ API接続: 成功");

    match client.options().await {
        Ok(options) => {
            let keys = options.as_object().map(|o| o.len()).unwrap_or(0);
            log::info!("✅ API応答: 正常");
            log::info!("📊 利用可能な機能数: {}", keys);
        }
        Err(e) => log::warn!("⚠️  API応答: エラー {}", e),
    }

    match client.list_models().await {
        Ok(models) => {
            log::info!("🎨 利用可能なモデル数: {}", models.len());
            if let Some(first) = models.first() {
                log::info!("📝 現在のモデル: {}", first.model_name);
            }
        }
        Err(e) => log::warn!("⚠️  モデル情報取得: エラー {}", e),
    }

    match client.list_samplers().await {
        Ok(samplers) => log::info!("🔧 利用可能なサンプラー数: {}", samplers.len()),
        Err(e) => log::warn!("⚠️  サンプラー情報取得: エラー {}", e),
    }

    log::info!("=== テスト完了 ===");
}

/// Print the numbered model catalog.
async fn list_models(config: &Config) {
    let client = match WebUiClient::new(config) {
        Ok(client) => client,
        Err(e) => fatal(e, false),
    };

    log::info!("=== 利用可能なモデル ===");
    match client.list_models().await {
        Ok(models) => {
            for (i, model) in models.iter().enumerate() {
                log::info!("{}. {} ({})", i + 1, model.title, model.model_name);
            }
        }
        Err(e) => log::error!("モデル一覧の取得に失敗: {}", e),
    }
}

fn fatal(err: SdBatchError, verbose: bool) -> ! {
    log::error!("{}", err);
    if verbose {
        let mut source = err.source();
        while let Some(cause) = source {
            log::error!("原因: {}", cause);
            source = cause.source();
        }
    }
    std::process::exit(1);
}
