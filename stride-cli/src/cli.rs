//! Main stride-cli command line entry points
use crate::{
    api::ApiClient,
    error::FlowError,
    paths::config_file,
    session::SessionStore,
    settings::Settings,
    verifier::{Activation, DeviceVerifier, Progress},
};
use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use inquire::ui::RenderConfig;
use stride_core::{
    common::{DeviceInfo, Identity},
    email::EmailAddress,
    flow::TransitionError,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "stride")]
#[command(about = "Sign in to your Stride workspace from the command line")]
pub struct Cli {
    #[arg(long, help = "Whether to turn off ansi terminal colors")]
    no_colors: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Verify this device and sign in to your account
    Login(LoginCommand),
    /// Print file paths used by the application (e.g. the path to config)
    Paths,
}

#[derive(Debug, Parser)]
pub struct LoginCommand {
    /// Email address of the account to sign in to.
    /// If not provided, you will be asked for it.
    #[arg(long)]
    email: Option<String>,
    /// Ask the service to remember this device and skip verification next time
    #[arg(long)]
    remember: bool,
}

impl Cli {
    pub async fn run(&self, settings: Settings) -> Result<()> {
        let ansi = !self.no_colors;
        setup_tracing(ansi);

        match &self.command {
            Commands::Login(login) => {
                let state = CliState::load(&settings, ansi);
                let identity = state.login(login).await?;

                println!("Signed in as {} <{}>", identity.name, identity.email);

                tracing::info!(id = %identity.id, "Session established");
            }
            Commands::Paths => {
                println!(
                    "{}",
                    config_file().to_str().expect("non utf8 config file path?")
                );
            }
        }

        Ok(())
    }
}

const RETRY_ENTER: &str = "Enter the code again";
const RETRY_RESEND: &str = "Email me a new code";
const RETRY_SWITCH: &str = "Use the other kind of code";
const RETRY_CANCEL: &str = "Cancel signing in";

const MODE_AUTHENTICATOR: &str = "A code from my authenticator app";
const MODE_BACKUP: &str = "One of my backup codes";

#[derive(Debug)]
pub(crate) struct CliState {
    pub(crate) render_config: RenderConfig,
    pub(crate) verifier: DeviceVerifier,
}

impl CliState {
    fn load(settings: &Settings, colors: bool) -> Self {
        let render_config = if colors {
            RenderConfig::default_colored()
        } else {
            RenderConfig::empty()
        };

        let api = ApiClient::new(settings);
        let verifier = DeviceVerifier::new(api, SessionStore::new());

        Self {
            render_config,
            verifier,
        }
    }

    async fn login(&self, cmd: &LoginCommand) -> Result<Identity> {
        let email = self.resolve_email(&cmd.email)?;
        tracing::info!(email = %email, "Email entered");

        let password = inquire::Password::new("What's your password?")
            .without_confirmation()
            .with_render_config(self.render_config)
            .prompt()?;

        let device = local_device();
        println!("We need to verify it's you on this device: {device}");

        self.verifier.activate(Activation {
            email,
            password,
            remember_device: cmd.remember,
            second_factor_hint: false,
            device: Some(device),
        });

        self.send_challenge().await?;

        let identity = match self.verify_email_code().await? {
            Progress::Completed(identity) => identity,
            Progress::SecondFactorRequired => self.verify_second_factor().await?,
            _ => bail!("sign-in did not complete"),
        };

        Ok(identity)
    }

    fn resolve_email(&self, flag: &Option<String>) -> Result<EmailAddress> {
        if let Some(email) = flag {
            return email
                .parse()
                .map_err(|_| anyhow!("{email} is not a valid email address"));
        }

        loop {
            let input = inquire::Text::new("What's your email address?")
                .with_render_config(self.render_config)
                .prompt()?;

            match input.parse() {
                Ok(email) => return Ok(email),
                Err(_) => println!("That doesn't look like an email address, please try again."),
            }
        }
    }

    async fn send_challenge(&self) -> Result<()> {
        loop {
            match self.verifier.ensure_challenge().await {
                Ok(_) => {
                    println!("We emailed you a 6-digit verification code.");
                    return Ok(());
                }
                Err(err) => {
                    println!("{err}");

                    let retry = inquire::Confirm::new("Try sending the email again?")
                        .with_default(true)
                        .with_render_config(self.render_config)
                        .prompt()?;

                    if !retry {
                        self.verifier.deactivate();
                        bail!("sign-in cancelled");
                    }
                }
            }
        }
    }

    async fn verify_email_code(&self) -> Result<Progress> {
        loop {
            let input = inquire::Text::new("Enter the code from the email:")
                .with_render_config(self.render_config)
                .prompt()?;
            self.verifier.enter_email_code(&input)?;

            match self.verifier.submit_email_code().await {
                Ok(progress) => return Ok(progress),
                Err(FlowError::Transition(TransitionError::IncompleteCode)) => {
                    println!("The code is exactly 6 digits, please check it.");
                }
                Err(err @ FlowError::CodeRejected(_)) => {
                    println!("{err}");

                    let choice = inquire::Select::new(
                        "What would you like to do?",
                        vec![RETRY_ENTER, RETRY_RESEND, RETRY_CANCEL],
                    )
                    .with_render_config(self.render_config)
                    .prompt()?;

                    if choice == RETRY_RESEND {
                        match self.verifier.resend_challenge().await {
                            Ok(_) => println!("We emailed you a new code."),
                            Err(err) => println!("{err}"),
                        }
                    } else if choice == RETRY_CANCEL {
                        self.verifier.deactivate();
                        bail!("sign-in cancelled");
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn verify_second_factor(&self) -> Result<Identity> {
        println!("This account is protected by two-factor authentication.");

        let mode = inquire::Select::new(
            "How do you want to verify?",
            vec![MODE_AUTHENTICATOR, MODE_BACKUP],
        )
        .with_render_config(self.render_config)
        .prompt()?;
        self.verifier.use_backup_code(mode == MODE_BACKUP)?;

        loop {
            let uses_backup = self
                .verifier
                .status()
                .map(|status| status.uses_backup_code)
                .unwrap_or_default();

            if uses_backup {
                let input = inquire::Text::new("Enter one of your backup codes:")
                    .with_render_config(self.render_config)
                    .prompt()?;
                self.verifier.enter_backup_code(&input)?;
            } else {
                let input = inquire::Text::new("Enter the code from your authenticator app:")
                    .with_render_config(self.render_config)
                    .prompt()?;
                self.verifier.enter_totp(&input)?;
            }

            match self.verifier.submit_second_factor().await {
                Ok(Progress::Completed(identity)) => return Ok(identity),
                Ok(_) => bail!("sign-in did not complete"),
                Err(FlowError::Transition(TransitionError::IncompleteCode)) => {
                    println!("The authenticator code is exactly 6 digits, please check it.");
                }
                Err(FlowError::Transition(TransitionError::EmptyBackupCode)) => {
                    println!("Backup codes can't be empty.");
                }
                Err(err @ FlowError::SecondFactorRejected(_)) => {
                    println!("{err}");

                    let choice = inquire::Select::new(
                        "What would you like to do?",
                        vec![RETRY_ENTER, RETRY_SWITCH, RETRY_CANCEL],
                    )
                    .with_render_config(self.render_config)
                    .prompt()?;

                    if choice == RETRY_SWITCH {
                        self.verifier.use_backup_code(!uses_backup)?;
                    } else if choice == RETRY_CANCEL {
                        self.verifier.deactivate();
                        bail!("sign-in cancelled");
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn local_device() -> DeviceInfo {
    DeviceInfo {
        device_type: "desktop".to_string(),
        device_name: sysinfo::System::host_name().unwrap_or_else(|| "unknown host".to_string()),
        browser_name: format!("stride-cli {}", env!("CARGO_PKG_VERSION")),
        operating_system: sysinfo::System::long_os_version()
            .or_else(sysinfo::System::name)
            .unwrap_or_else(|| std::env::consts::OS.to_string()),
        location: None,
    }
}

fn setup_tracing(ansi: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(ansi)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::from_default_env())
        .init();
}
