use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use edutrack_capture::permission::settings_hint;
use edutrack_capture::{request_camera_access, Camera, CameraAccess, CapturedImage};
use edutrack_core::{Role, Route};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

mod context;
mod preferences;
mod upload;

use context::{AppContext, Overrides};
use preferences::{PreferenceKey, Preferences, TomlFileStore};
use upload::UploadClient;

/// Raw frames to try before giving up on a dark camera.
const MAX_CAPTURE_ATTEMPTS: usize = 30;

#[derive(Parser)]
#[command(name = "edutrack", about = "EduTrack attendance CLI")]
struct Cli {
    /// Act as this role (overrides the stored preference)
    #[arg(long, global = true)]
    role: Option<Role>,

    /// Gateway base URL (overrides EDUTRACK_SERVER_URL and the stored preference)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a photo and mark attendance
    Mark {
        /// Upload this image file instead of using the camera
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// V4L2 camera device
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,
        /// Give up waiting for the server after this many seconds
        #[arg(long, default_value_t = upload::DEFAULT_TIMEOUT.as_secs())]
        timeout_secs: u64,
        /// Capture immediately without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show gateway status
    Status,
    /// List cameras and whether they can be opened
    Devices,
    /// Show the screens available to the current role
    Routes,
    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Print all preferences
    Show,
    /// Set a preference (theme, server-url, role)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut preferences = Preferences::load(TomlFileStore::new(TomlFileStore::default_path()))?;

    // Preferences must stay editable before a role has been chosen.
    if let Commands::Prefs { action } = &cli.command {
        match action {
            PrefsAction::Show => {
                for key in PreferenceKey::ALL {
                    println!("{key} = {}", preferences.get(key).unwrap_or("(unset)"));
                }
            }
            PrefsAction::Set { key, value } => {
                let key: PreferenceKey = key.parse()?;
                if preferences.set(key, value)? {
                    println!("{key} = {}", preferences.get(key).unwrap_or_default());
                } else {
                    println!("{key} unchanged");
                }
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let ctx = AppContext::resolve(
        preferences,
        Overrides {
            role: cli.role,
            server_flag: cli.server,
            server_env: std::env::var("EDUTRACK_SERVER_URL").ok(),
        },
    )?;

    match cli.command {
        Commands::Mark {
            image,
            device,
            timeout_secs,
            yes,
        } => mark(&ctx, image, &device, Duration::from_secs(timeout_secs), yes).await,
        Commands::Status => {
            ctx.require(Route::Dashboard)?;
            status(&ctx.server_url).await
        }
        Commands::Devices => {
            ctx.require(Route::MarkAttendance)?;
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for d in devices {
                let access = request_camera_access(&d.path);
                println!("{}  {} ({})  access: {access}", d.path, d.name, d.driver);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Routes => {
            println!("Role: {} (home: {})", ctx.role, ctx.role.home());
            for route in ctx.role.routes() {
                println!("  {route}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Prefs { .. } => Ok(ExitCode::SUCCESS),
    }
}

async fn mark(
    ctx: &AppContext<TomlFileStore>,
    image: Option<PathBuf>,
    device: &str,
    timeout: Duration,
    yes: bool,
) -> Result<ExitCode> {
    ctx.require(Route::MarkAttendance)?;

    let image = match image {
        Some(path) => Some(CapturedImage::from_file(&path)?),
        None => capture_from_camera(device, yes, std::io::stdin().lock()).await?,
    };
    let Some(image) = image else {
        println!("Capture cancelled.");
        return Ok(ExitCode::SUCCESS);
    };

    println!("Uploading {} ({} bytes)...", image.filename, image.bytes.len());
    let client = UploadClient::new(&ctx.server_url, timeout)?;
    let outcome = client.upload_for_recognition(&image).await?;
    drop(image);

    let palette = ctx.palette(std::io::stdout().is_terminal());
    let result = &outcome.result;
    if result.success {
        println!("{}{}{}", palette.ok, result.message, palette.reset);
        if let (Some(person), Some(confidence)) = (&result.person_id, result.confidence) {
            println!("  student: {person}  confidence: {confidence:.2}");
        }
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}{}{}", palette.err, result.message, palette.reset);
        println!("  request id: {}", outcome.request_id);
        Ok(ExitCode::FAILURE)
    }
}

/// Check permission, confirm with the user, then grab one still.
/// `None` means the user cancelled.
async fn capture_from_camera(
    device: &str,
    yes: bool,
    input: impl BufRead,
) -> Result<Option<CapturedImage>> {
    check_access(device, request_camera_access(device))?;

    if !yes && !confirm_capture(input, std::io::stdout())? {
        return Ok(None);
    }

    let device = device.to_string();
    let image = tokio::task::spawn_blocking(move || {
        Camera::open(&device)?.capture_still(MAX_CAPTURE_ATTEMPTS)
    })
    .await
    .context("capture thread panicked")??;
    Ok(Some(image))
}

fn check_access(device: &str, access: CameraAccess) -> Result<()> {
    match access {
        CameraAccess::Granted => Ok(()),
        CameraAccess::Denied => bail!(settings_hint(device)),
        CameraAccess::Undetermined => {
            bail!("camera {device} is not available; pass --device or --image")
        }
    }
}

/// Returns false when the user types `q`.
fn confirm_capture(mut input: impl BufRead, mut out: impl Write) -> Result<bool> {
    write!(out, "Look at the camera and press Enter to capture (q to cancel): ")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(!line.trim().eq_ignore_ascii_case("q"))
}

async fn status(server_url: &str) -> Result<ExitCode> {
    let url = format!("{server_url}/api/health");
    let body: serde_json::Value = reqwest::Client::new()
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .with_context(|| format!("edutrackd not reachable at {server_url}"))?
        .error_for_status()?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(ExitCode::SUCCESS)
}
