//! `gfcat` command driver.
//!
//! The driver is callable repeatedly from one process: [`parse`] is a pure function of the
//! argument list and [`execute`] threads everything it needs through a [`Context`], so an
//! interactive shell holding an established session can run `cat` as often as it likes.

use anyhow::anyhow;
use clap::Parser;
use tokio::io::AsyncWrite;
use tracing::instrument;

use common::cat::{self, Summary};
use common::session::{self, Session};
use common::volume::{Connector, Volume};
use common::{
    CallerDefaults, Error, ErrorKind, GLUSTER_DEFAULT_PORT, GlusterUrl, VolumePath, XlatorOption,
    XlatorOptions,
};

pub const PROGRAM: &str = "gfcat";

#[derive(Parser, Debug, Clone)]
#[command(
    name = PROGRAM,
    version,
    long_version = common::version::long_version(),
    about = "Read a file on a remote Gluster volume and write it to standard output",
    long_about = "`gfcat` reads a file on a remote Gluster volume and writes it to standard output.

The file is locked exclusively for the duration of the read, so the read never observes a \
concurrent writer. If another client holds a lock on the file, gfcat fails immediately \
instead of waiting.

EXAMPLES:
    # Write the contents of /path/to/file on the Gluster volume groot on host localhost
    gfcat glfs://localhost/groot/path/to/file

    # In the context of a shell with a connection established, cat the file on the root of
    # the volume the shell is connected to
    gfcli (localhost/groot)> cat /file"
)]
pub struct Args {
    /// Log additional debug information, including the volume session's own diagnostics
    #[arg(short, long)]
    pub debug: bool,

    /// Translator option for the connection, of the form xlator.key=value (can be specified multiple times)
    #[arg(
        short = 'o',
        long = "xlator-option",
        value_name = "OPTION",
        action = clap::ArgAction::Append
    )]
    pub xlator_options: Vec<String>,

    /// Port to connect to (default: 24007), only used when the URL has no port
    #[arg(short, long, value_name = "PORT", value_parser = common::url::parse_port)]
    pub port: Option<u16>,

    // ARGUMENTS
    /// glfs://HOST[:PORT]/VOLUME/PATH, or /PATH when a session is already established
    #[arg(value_name = "URL")]
    pub url: String,
}

/// Result of one invocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// `--help` or `--version` was served, nothing else was done.
    UsageHandled,
    Failure(ErrorKind),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success | Outcome::UsageHandled => 0,
            Outcome::Failure(_) => 1,
        }
    }
}

/// What to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Full locator, a session is built for it.
    Url(GlusterUrl),
    /// Path inside the volume of a session supplied by the caller.
    Path(VolumePath),
}

/// Parsed invocation state, released as a whole when the invocation ends.
#[derive(Debug, Clone)]
pub struct Command {
    pub target: Target,
    pub xlator_options: XlatorOptions,
    pub debug: bool,
    /// The operand exactly as given, used in diagnostics.
    pub url: String,
}

/// Everything an invocation needs besides its arguments.
pub struct Context<'a, W: ?Sized> {
    pub connector: &'a dyn Connector,
    /// Session already established by the caller, never closed by gfcat.
    pub session: Option<&'a dyn Volume>,
    pub defaults: Option<&'a CallerDefaults>,
    pub sink: &'a mut W,
    pub settings: cat::Settings,
}

impl<'a, W: AsyncWrite + Unpin + ?Sized> Context<'a, W> {
    pub fn new(connector: &'a dyn Connector, sink: &'a mut W) -> Self {
        Self {
            connector,
            session: None,
            defaults: None,
            sink,
            settings: cat::Settings::default(),
        }
    }

    pub fn with_session(mut self, session: &'a dyn Volume) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_defaults(mut self, defaults: &'a CallerDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }
}

/// Parses a full argument list, program name first.
///
/// With `connected` set only a bare path is accepted as operand. Help, version and any
/// diagnostics are printed here; the returned `Outcome` tells the caller how to finish.
pub fn parse<I, T>(args: I, connected: bool) -> Result<Command, Outcome>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let args = match Args::try_parse_from(args) {
        Ok(args) => args,
        Err(error) => {
            // clap sends help and version to stdout, usage errors to stderr
            let _ = error.print();
            return Err(match error.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    Outcome::UsageHandled
                }
                // a missing operand is a malformed invocation rather than a bad flag
                clap::error::ErrorKind::MissingRequiredArgument => {
                    Outcome::Failure(ErrorKind::Parse)
                }
                _ => Outcome::Failure(ErrorKind::Usage),
            });
        }
    };
    command_from_args(args, connected).map_err(|error| {
        eprintln!("{PROGRAM}: {error:#}");
        eprintln!("Try '{PROGRAM} --help' for more information.");
        Outcome::Failure(error.kind())
    })
}

fn command_from_args(args: Args, connected: bool) -> common::Result<Command> {
    let mut xlator_options = XlatorOptions::new();
    for raw in &args.xlator_options {
        xlator_options.append(XlatorOption::parse(raw)?);
    }
    let target = if connected {
        Target::Path(VolumePath::parse(&args.url)?)
    } else {
        let port = args.port.unwrap_or(GLUSTER_DEFAULT_PORT);
        Target::Url(GlusterUrl::parse(&args.url, port)?)
    };
    Ok(Command {
        target,
        xlator_options,
        debug: args.debug,
        url: args.url,
    })
}

/// Runs a parsed command; failures are reported through `tracing` before returning.
#[instrument(skip(ctx))]
pub async fn execute<W>(command: Command, ctx: &mut Context<'_, W>) -> Outcome
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let result = match (ctx.session, &command.target) {
        (Some(volume), Target::Path(path)) => {
            if !command.xlator_options.is_empty() {
                tracing::debug!("session is already configured, ignoring translator options");
            }
            let session = Session::borrowed(volume);
            let result = cat::cat_locked(
                &session,
                path.as_str(),
                &command.url,
                ctx.sink,
                &ctx.settings,
            )
            .await;
            session.close().await;
            result
        }
        (None, Target::Url(url)) => cat_without_session(&command, url, ctx).await,
        (Some(_), Target::Url(_)) => Err(Error::parse(
            command.url.as_str(),
            anyhow!("a session is already established, expected a path inside its volume"),
        )),
        (None, Target::Path(_)) => Err(Error::parse(
            command.url.as_str(),
            anyhow!("no session is established, expected glfs://HOST[:PORT]/VOLUME/PATH"),
        )),
    };
    match result {
        Ok(summary) => {
            tracing::debug!("{}: {}", command.url, summary);
            Outcome::Success
        }
        Err(error) => {
            tracing::error!("{:#}", error);
            Outcome::Failure(error.kind())
        }
    }
}

async fn cat_without_session<W>(
    command: &Command,
    url: &GlusterUrl,
    ctx: &mut Context<'_, W>,
) -> common::Result<Summary>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let debug = command.debug || ctx.defaults.is_some_and(|defaults| defaults.debug);
    let mut session = session::connect(ctx.connector, url).await?;
    let result = configure_and_cat(&mut session, command, url, debug, ctx).await;
    session.close().await;
    result
}

async fn configure_and_cat<W>(
    session: &mut Session<'_>,
    command: &Command,
    url: &GlusterUrl,
    debug: bool,
    ctx: &mut Context<'_, W>,
) -> common::Result<Summary>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if let Some(volume) = session.volume_mut() {
        session::apply_xlator_options(volume, command.xlator_options.clone()).await?;
        if debug {
            session::set_debug_logging(
                volume,
                std::path::Path::new(common::config::DEBUG_LOG_SINK),
                tracing::Level::DEBUG,
            )
            .await?;
        }
    }
    cat::cat_locked(session, &url.path, &command.url, ctx.sink, &ctx.settings).await
}

/// Parses `args` and runs them, the entry point for callers invoking gfcat repeatedly.
pub async fn run<I, T, W>(args: I, ctx: &mut Context<'_, W>) -> Outcome
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    W: AsyncWrite + Unpin + ?Sized,
{
    match parse(args, ctx.session.is_some()) {
        Ok(command) => execute(command, ctx).await,
        Err(outcome) => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Stage;
    use common::testutils::{MemConnector, MemVolume};
    use common::volume::LockKind;

    const URL: &str = "glfs://localhost/groot/file";

    fn volume() -> MemVolume {
        MemVolume::new().with_file("/file", b"hello gluster")
    }

    #[test]
    fn parse_full_url() {
        let command = parse(["gfcat", URL], false).unwrap();
        assert_eq!(
            command.target,
            Target::Url(GlusterUrl::parse(URL, GLUSTER_DEFAULT_PORT).unwrap())
        );
        assert_eq!(command.url, URL);
        assert!(!command.debug);
        assert!(command.xlator_options.is_empty());
    }

    #[test]
    fn parse_keeps_option_order() {
        let command = parse(["gfcat", "-o", "x.a=1", "--xlator-option", "x.b=2", URL], false)
            .unwrap();
        let options: Vec<String> = command
            .xlator_options
            .iter()
            .map(|option| option.to_string())
            .collect();
        assert_eq!(options, vec!["x.a=1".to_string(), "x.b=2".to_string()]);
    }

    #[test]
    fn parse_port_flag() {
        let command = parse(["gfcat", "-p", "24010", URL], false).unwrap();
        match command.target {
            Target::Url(url) => assert_eq!(url.port, 24010),
            Target::Path(_) => panic!("Expected a full url"),
        }
        assert_eq!(
            parse(["gfcat", "--port", "0", URL], false).unwrap_err(),
            Outcome::Failure(ErrorKind::Usage)
        );
    }

    #[test]
    fn parse_port_flag_yields_to_url_port() {
        let command = parse(
            ["gfcat", "-p", "24010", "glfs://localhost:24011/groot/file"],
            false,
        )
        .unwrap();
        match command.target {
            Target::Url(url) => assert_eq!(url.port, 24011),
            Target::Path(_) => panic!("Expected a full url"),
        }
    }

    #[test]
    fn parse_help_and_version_are_handled() {
        assert_eq!(
            parse(["gfcat", "--help"], false).unwrap_err(),
            Outcome::UsageHandled
        );
        assert_eq!(
            parse(["gfcat", "--version"], false).unwrap_err(),
            Outcome::UsageHandled
        );
        assert_eq!(
            parse(["gfcat", "--version"], true).unwrap_err(),
            Outcome::UsageHandled
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            parse(["gfcat"], false).unwrap_err(),
            Outcome::Failure(ErrorKind::Parse)
        );
        assert_eq!(
            parse(["gfcat"], true).unwrap_err(),
            Outcome::Failure(ErrorKind::Parse)
        );
        assert_eq!(
            parse(["gfcat", "--bogus", URL], false).unwrap_err(),
            Outcome::Failure(ErrorKind::Usage)
        );
        assert_eq!(
            parse(["gfcat", "-o", "nodot=1", URL], false).unwrap_err(),
            Outcome::Failure(ErrorKind::Parse)
        );
        assert_eq!(
            parse(["gfcat", "glfs://localhost/groot"], false).unwrap_err(),
            Outcome::Failure(ErrorKind::Parse)
        );
        assert_eq!(
            parse(["gfcat", URL], true).unwrap_err(),
            Outcome::Failure(ErrorKind::Parse)
        );
    }

    #[test]
    fn parse_bare_path_when_connected() {
        let command = parse(["gfcat", "/file"], true).unwrap();
        assert_eq!(command.target, Target::Path(VolumePath::parse("/file").unwrap()));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_eq!(Outcome::UsageHandled.exit_code(), 0);
        assert_eq!(Outcome::Failure(ErrorKind::Usage).exit_code(), 1);
        assert_eq!(Outcome::Failure(ErrorKind::Copy(Stage::Lock)).exit_code(), 1);
    }

    #[tokio::test]
    async fn cat_without_session_end_to_end() {
        let volume = volume();
        let connector = MemConnector::new(volume.clone());
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink);
        let outcome = run(
            ["gfcat", "-o", "x.a=1", "-o", "x.b=2", "-p", "24010", URL],
            &mut ctx,
        )
        .await;
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(sink, b"hello gluster");
        assert_eq!(connector.connected_to()[0].port, 24010);
        assert_eq!(
            volume.applied_options(),
            vec!["x.a=1".to_string(), "x.b=2".to_string()]
        );
        assert_eq!(volume.locks_taken(), vec![LockKind::Write]);
        assert_eq!(volume.logging(), None);
        assert_eq!(volume.open_handles(), 0);
        assert_eq!(volume.fini_count(), 1);
    }

    #[tokio::test]
    async fn help_and_missing_operand_never_connect() {
        let connector = MemConnector::new(volume());
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink);
        assert_eq!(run(["gfcat", "--help"], &mut ctx).await, Outcome::UsageHandled);
        assert_eq!(run(["gfcat", "--version"], &mut ctx).await, Outcome::UsageHandled);
        assert_eq!(
            run(["gfcat", "-d"], &mut ctx).await,
            Outcome::Failure(ErrorKind::Parse)
        );
        assert!(connector.connected_to().is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn debug_flag_enables_session_logging() {
        let volume = volume();
        let connector = MemConnector::new(volume.clone());
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink);
        assert_eq!(run(["gfcat", "-d", URL], &mut ctx).await, Outcome::Success);
        assert_eq!(
            volume.logging(),
            Some((
                std::path::PathBuf::from(common::config::DEBUG_LOG_SINK),
                tracing::Level::DEBUG
            ))
        );
    }

    #[tokio::test]
    async fn caller_defaults_enable_debug() {
        let volume = volume();
        let connector = MemConnector::new(volume.clone());
        let defaults = CallerDefaults { debug: true };
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink).with_defaults(&defaults);
        assert_eq!(run(["gfcat", URL], &mut ctx).await, Outcome::Success);
        assert!(volume.logging().is_some());
    }

    #[tokio::test]
    async fn connect_failure() {
        let connector = MemConnector::unreachable();
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink);
        assert_eq!(
            run(["gfcat", URL], &mut ctx).await,
            Outcome::Failure(ErrorKind::Connect)
        );
        assert_eq!(connector.connected_to().len(), 1);
    }

    #[tokio::test]
    async fn rejected_option_closes_session_without_opening() {
        let volume = volume().reject_option("x.b");
        let connector = MemConnector::new(volume.clone());
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink);
        let outcome = run(["gfcat", "-o", "x.a=1", "-o", "x.b=2", URL], &mut ctx).await;
        assert_eq!(outcome, Outcome::Failure(ErrorKind::Config));
        assert!(volume.locks_taken().is_empty());
        assert_eq!(volume.close_count(), 0);
        assert_eq!(volume.fini_count(), 1);
    }

    #[tokio::test]
    async fn lock_contention_closes_everything() {
        let volume = volume().locked_by_other("/file");
        let connector = MemConnector::new(volume.clone());
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink);
        assert_eq!(
            run(["gfcat", URL], &mut ctx).await,
            Outcome::Failure(ErrorKind::Copy(Stage::Lock))
        );
        assert!(sink.is_empty());
        assert_eq!(volume.open_handles(), 0);
        assert_eq!(volume.close_count(), 1);
        assert_eq!(volume.fini_count(), 1);
    }

    #[tokio::test]
    async fn supplied_session_is_used_and_left_open() {
        let volume = volume();
        let connector = MemConnector::unreachable();
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink).with_session(&volume);
        assert_eq!(
            run(["gfcat", "-o", "x.a=1", "/file"], &mut ctx).await,
            Outcome::Success
        );
        // the same context serves another invocation
        assert_eq!(run(["gfcat", "/file"], &mut ctx).await, Outcome::Success);
        assert_eq!(sink, b"hello glusterhello gluster");
        assert!(connector.connected_to().is_empty());
        assert!(volume.applied_options().is_empty());
        assert_eq!(volume.fini_count(), 0);
        assert_eq!(volume.close_count(), 2);
    }

    #[tokio::test]
    async fn supplied_session_requires_bare_path() {
        let volume = volume();
        let connector = MemConnector::unreachable();
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink).with_session(&volume);
        assert_eq!(
            run(["gfcat", URL], &mut ctx).await,
            Outcome::Failure(ErrorKind::Parse)
        );
        assert_eq!(volume.close_count(), 0);
    }

    #[tokio::test]
    async fn execute_rejects_target_without_matching_session() {
        let connector = MemConnector::new(volume());
        let mut sink = Vec::new();
        let mut ctx = Context::new(&connector, &mut sink);
        let command = parse(["gfcat", "/file"], true).unwrap();
        assert_eq!(
            execute(command, &mut ctx).await,
            Outcome::Failure(ErrorKind::Parse)
        );
        assert!(connector.connected_to().is_empty());
    }
}
