use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use certinstall::common::InstallResult;
use certinstall::context::{check_superuser, ApiContext};
use certinstall::installer::{CertInstaller, InstallSummary};
use certinstall::request::{InstallRequest, TtySecretReader};

/// Install new SSL server certificates.
#[derive(Parser)]
#[command(name = "certinstall", version, about = "Install new SSL server certificates.")]
struct Cli {
    /// Install the certificate for the directory server
    #[arg(short = 'd', long = "dirsrv")]
    dirsrv: bool,

    /// Install the certificate for the http server
    #[arg(short = 'w', long = "http")]
    http: bool,

    /// The password of the Directory Server PKCS#12 file
    #[arg(long = "dirsrv_pin", value_name = "PIN")]
    dirsrv_pin: Option<String>,

    /// The password of the Apache Server PKCS#12 file
    #[arg(long = "http_pin", value_name = "PIN")]
    http_pin: Option<String>,

    /// PKCS#12 file with the new server certificate
    #[arg(value_name = "PKCS12_FILE")]
    pkcs12_files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(summary) => report(&summary),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> InstallResult<InstallSummary> {
    check_superuser()?;
    let request = InstallRequest::configure(
        cli.dirsrv,
        cli.http,
        cli.dirsrv_pin,
        cli.http_pin,
        &cli.pkcs12_files,
    )?;
    let context = ApiContext::bootstrap()?;
    let request = request.collect_secrets(&TtySecretReader)?;
    let installer = CertInstaller::new(&context, &request);
    Ok(installer.run())
}

fn report(summary: &InstallSummary) -> ExitCode {
    for (target, outcome) in summary.outcomes() {
        match outcome {
            Ok(()) => println!("{}: certificate installed", target),
            Err(e) => eprintln!("{}: {}", target, e),
        }
    }
    if summary.succeeded() {
        ExitCode::SUCCESS
    } else {
        if summary.partial() {
            eprintln!("only part of the requested certificates were installed");
        }
        ExitCode::FAILURE
    }
}
