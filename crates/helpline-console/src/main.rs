//! HelplineOS console CLI.
//!
//! This is the entry point for the `helpline` binary. Every subcommand
//! opens the matching console screen, applies the role guard, and prints
//! the result as text or, with `--json`, as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use helpline_client::{ClientConfig, FileSessionStore, Gateway, HttpGateway, SessionContext};
use helpline_console::{
    dashboard, CallHistory, CallLogFlow, CallLogged, ContactDirectory, ContactForm, FlowError,
    NavigationShell, NewContactDetails, Redirect, RedirectEntry, ResolutionPhase, Route,
    SessionHolder, UserAdmin, UserForm,
};
use helpline_core::{
    format_duration, format_tags, CallEventId, CallFilter, CallId, CallPatch, CallRecord,
    CallStatus, CallType, Contact, ContactId, Priority, Role, User, UserId, UserPatch, UserStatus,
};

/// HelplineOS console: log calls, manage contacts and users.
#[derive(Parser, Debug)]
#[command(name = "helpline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API base URL, including the `/api` prefix.
    #[arg(long, env = "HELPLINE_API_URL", global = true)]
    api_url: Option<String>,

    /// Session file location.
    #[arg(long, env = "HELPLINE_SESSION_FILE", global = true)]
    session_file: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session.
    Login {
        /// Account email.
        #[arg(long)]
        email: String,
        /// Account password.
        #[arg(long, env = "HELPLINE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        /// Display name.
        #[arg(long)]
        name: String,
        /// Account email.
        #[arg(long)]
        email: String,
        /// Password, at least 6 characters.
        #[arg(long)]
        password: String,
        /// Password again.
        #[arg(long)]
        confirm: String,
    },
    /// Forget the session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Summary statistics.
    Dashboard,
    /// Contact directory.
    #[command(subcommand)]
    Contacts(ContactsCommand),
    /// Call records.
    #[command(subcommand)]
    Calls(CallsCommand),
    /// Telephony events.
    #[command(subcommand)]
    Events(EventsCommand),
    /// User administration (admins only).
    #[command(subcommand)]
    Users(UsersCommand),
}

#[derive(Subcommand, Debug)]
enum ContactsCommand {
    /// List contacts.
    List {
        /// Match name, phone, email or company.
        #[arg(long)]
        search: Option<String>,
        /// Only contacts with this tag.
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show one contact.
    Show { id: ContactId },
    /// Look a phone number up.
    Lookup { phone: String },
    /// Create a contact.
    Create(ContactFields),
    /// Replace a contact's fields.
    Update {
        id: ContactId,
        #[command(flatten)]
        fields: ContactFields,
    },
    /// Delete a contact.
    Delete { id: ContactId },
    /// Create the contact for a telephony redirect, then print the call logging path.
    FromRedirect {
        /// Redirect path or URL, e.g. `/contacts/new?phone=..&callEventId=..`.
        redirect: String,
        #[command(flatten)]
        details: ContactDetailsArgs,
        /// Comma-separated tags.
        #[arg(long, default_value = "")]
        tags: String,
    },
}

#[derive(Args, Debug)]
struct ContactFields {
    /// Phone number.
    #[arg(long)]
    phone: String,
    #[command(flatten)]
    details: ContactDetailsArgs,
    /// Comma-separated tags.
    #[arg(long, default_value = "")]
    tags: String,
}

#[derive(Args, Debug, Default)]
struct ContactDetailsArgs {
    /// Contact name.
    #[arg(long, default_value = "")]
    name: String,
    /// Contact email.
    #[arg(long, default_value = "")]
    email: String,
    /// Company.
    #[arg(long, default_value = "")]
    company: String,
    /// Address.
    #[arg(long, default_value = "")]
    address: String,
}

impl ContactFields {
    fn into_form(self) -> ContactForm {
        ContactForm {
            phone_number: self.phone,
            name: self.details.name,
            email: self.details.email,
            address: self.details.address,
            company: self.details.company,
            tags: self.tags,
        }
    }
}

#[derive(Subcommand, Debug)]
enum CallsCommand {
    /// Log a call.
    Log(LogArgs),
    /// List calls.
    List(CallFilterArgs),
    /// Show one call.
    Show { id: CallId },
    /// Update a call record.
    Update {
        id: CallId,
        /// Duration in seconds or `m:ss`.
        #[arg(long)]
        duration: Option<String>,
        #[arg(long = "type")]
        call_type: Option<CallType>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<CallStatus>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        resolution_notes: Option<String>,
    },
    /// Export calls as CSV.
    Export {
        #[command(flatten)]
        filter: CallFilterArgs,
        /// Output file.
        #[arg(long, default_value = "calls_export.csv")]
        out: PathBuf,
    },
    /// Call statistics.
    Stats,
}

#[derive(Args, Debug)]
struct LogArgs {
    /// Caller number for a manual entry.
    #[arg(long, conflicts_with_all = ["redirect", "event"], required_unless_present_any = ["redirect", "event"])]
    phone: Option<String>,
    /// Telephony redirect path or URL.
    #[arg(long, conflicts_with = "event")]
    redirect: Option<String>,
    /// Pending telephony event to log.
    #[arg(long)]
    event: Option<CallEventId>,
    /// Duration in seconds or `m:ss`.
    #[arg(long, conflicts_with = "timer")]
    duration: Option<String>,
    /// Time the call; stops when Enter is pressed.
    #[arg(long)]
    timer: bool,
    #[arg(long = "type", default_value = "inquiry")]
    call_type: CallType,
    #[arg(long, default_value = "normal")]
    priority: Priority,
    #[arg(long, default_value = "completed")]
    status: CallStatus,
    #[arg(long, default_value = "")]
    notes: String,
    #[arg(long, default_value = "")]
    resolution_notes: String,
    /// Details saved on a newly created contact.
    #[command(flatten)]
    contact: ContactDetailsArgs,
}

#[derive(Args, Debug, Default)]
struct CallFilterArgs {
    /// Match caller number, contact name or notes.
    #[arg(long)]
    search: Option<String>,
    #[arg(long = "type")]
    call_type: Option<CallType>,
    #[arg(long)]
    priority: Option<Priority>,
    #[arg(long)]
    status: Option<CallStatus>,
    /// Earliest date, `YYYY-MM-DD`.
    #[arg(long)]
    from: Option<String>,
    /// Latest date, `YYYY-MM-DD`.
    #[arg(long)]
    to: Option<String>,
}

impl From<CallFilterArgs> for CallFilter {
    fn from(args: CallFilterArgs) -> Self {
        Self {
            search: args.search,
            call_type: args.call_type,
            priority: args.priority,
            status: args.status,
            date_from: args.from,
            date_to: args.to,
        }
    }
}

#[derive(Subcommand, Debug)]
enum EventsCommand {
    /// Calls waiting to be logged.
    Pending,
    /// Show one event and where it leads.
    Show { id: CallEventId },
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    /// List users.
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        status: Option<UserStatus>,
    },
    /// Create a user.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "agent")]
        role: Role,
    },
    /// Change name or email.
    Update {
        id: UserId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Activate or deactivate.
    Toggle { id: UserId },
    /// Change role.
    Role { id: UserId, role: Role },
    /// Delete a user.
    Delete { id: UserId },
    /// Set a new password.
    ResetPassword {
        id: UserId,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// System-wide statistics.
    Stats,
}

// ============================================================================
// Wiring
// ============================================================================

struct Console {
    config: ClientConfig,
    gateway: Arc<HttpGateway>,
    holder: SessionHolder,
    shell: NavigationShell,
    json: bool,
}

impl Console {
    fn connect(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = ClientConfig::from_env().context("invalid configuration")?;
        if let Some(url) = &cli.api_url {
            config = config.with_api_url(url.clone());
        }
        if let Some(path) = &cli.session_file {
            config = config.with_session_file(path.clone());
        }

        let store = Arc::new(FileSessionStore::new(config.session_file.clone()));
        let (session, writer) = SessionContext::new(store);
        let gateway = Arc::new(HttpGateway::new(&config, session.clone())?);
        let holder = SessionHolder::new(gateway.clone(), writer);
        let shell = NavigationShell::new(session);

        tracing::debug!(
            api_url = %config.api_url,
            session_file = %config.session_file.display(),
            "Console configured"
        );
        Ok(Self {
            config,
            gateway,
            holder,
            shell,
            json: cli.json,
        })
    }

    fn session(&self) -> SessionContext {
        self.holder.context()
    }

    fn gateway(&self) -> Arc<dyn Gateway> {
        self.gateway.clone()
    }

    /// Restore the session and open `route`, or explain why not.
    async fn open(&mut self, route: Route) -> anyhow::Result<()> {
        self.holder.initialize().await;
        self.shell.poll();
        match self.shell.navigate(route) {
            landed if landed == route => Ok(()),
            Route::Login => bail!("Not logged in. Run `helpline login` first."),
            _ => bail!("Your role cannot open {}", route.label()),
        }
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "helpline=debug,warn"
    } else {
        "helpline=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut console = Console::connect(&cli)?;
    let result = run(&mut console, cli.command).await;

    if let Err(e) = &result {
        if e
            .downcast_ref::<FlowError>()
            .is_some_and(FlowError::is_unauthorized)
            || console.shell.poll() == Some(Route::Login)
        {
            bail!("Your session has expired. Please log in again.");
        }
    }
    result
}

async fn run(console: &mut Console, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let user = console.holder.login(&email, &password).await?;
            console.emit(&user, || format!("Logged in as {} ({})", user.name, user.role))
        }
        Command::Register {
            name,
            email,
            password,
            confirm,
        } => {
            let user = console
                .holder
                .register(&name, &email, &password, &confirm)
                .await?;
            console.emit(&user, || format!("Registered and logged in as {}", user.name))
        }
        Command::Logout => {
            console.holder.logout();
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => {
            console.open(Route::Dashboard).await?;
            let user = console
                .holder
                .current_user()
                .context("Not logged in. Run `helpline login` first.")?;
            let nav = console
                .shell
                .nav_items()
                .iter()
                .map(|r| r.label())
                .collect::<Vec<_>>()
                .join(", ");
            console.emit(&user, || {
                format!("{} <{}>\nrole: {}\nscreens: {nav}", user.name, user.email, user.role)
            })
        }
        Command::Dashboard => {
            console.open(Route::Dashboard).await?;
            let summary = dashboard::load(console.gateway.as_ref(), &console.session()).await?;
            console.emit(&summary, || render_dashboard(&summary))
        }
        Command::Contacts(cmd) => run_contacts(console, cmd).await,
        Command::Calls(cmd) => run_calls(console, cmd).await,
        Command::Events(cmd) => run_events(console, cmd).await,
        Command::Users(cmd) => run_users(console, cmd).await,
    }
}

// ============================================================================
// Contacts
// ============================================================================

async fn run_contacts(console: &mut Console, cmd: ContactsCommand) -> anyhow::Result<()> {
    let route = match cmd {
        ContactsCommand::Create(_) | ContactsCommand::FromRedirect { .. } => Route::NewContact,
        _ => Route::Contacts,
    };
    console.open(route).await?;
    let directory = ContactDirectory::new(
        console.gateway(),
        console.session(),
        console.config.search_debounce(),
    )?;

    match cmd {
        ContactsCommand::List { search, tag } => {
            if let Some(text) = search {
                directory.search(&text);
            }
            let contacts = directory.set_tag(tag.as_deref()).await?;
            console.emit(&contacts, || render_contacts(&contacts))
        }
        ContactsCommand::Show { id } => {
            let contact = directory.get(&id).await?;
            console.emit(&contact, || render_contact(&contact))
        }
        ContactsCommand::Lookup { phone } => {
            let flow = CallLogFlow::manual(console.gateway(), console.session())?;
            flow.set_caller_number(&phone)?;
            let phase = flow.lookup().await?;
            let contact = flow.contact();
            console.emit(&contact, || match &contact {
                Some(c) => render_contact(c),
                None => format!("No contact for {phone} ({phase})"),
            })
        }
        ContactsCommand::Create(fields) => {
            let contact = directory.create(&fields.into_form()).await?;
            console.emit(&contact, || format!("Created contact {}", contact.id))
        }
        ContactsCommand::Update { id, fields } => {
            let contact = directory.update(&id, &fields.into_form()).await?;
            console.emit(&contact, || format!("Updated contact {}", contact.id))
        }
        ContactsCommand::Delete { id } => {
            directory.delete(&id).await?;
            println!("Deleted contact {id}");
            Ok(())
        }
        ContactsCommand::FromRedirect {
            redirect,
            details,
            tags,
        } => {
            let redirect = Redirect::parse(&redirect)?;
            let form = ContactFields {
                phone: redirect.entry.phone.clone(),
                details,
                tags,
            }
            .into_form();
            let (contact, next) = directory.create_from_redirect(&redirect.entry, &form).await?;
            let path = next.to_path();
            console.emit(&contact, || {
                format!("Created contact {}\nLog the call at {path}", contact.id)
            })
        }
    }
}

// ============================================================================
// Calls
// ============================================================================

async fn run_calls(console: &mut Console, cmd: CallsCommand) -> anyhow::Result<()> {
    let route = match cmd {
        CallsCommand::Log(_) => Route::NewCall,
        _ => Route::Calls,
    };
    console.open(route).await?;
    let history = CallHistory::new(console.gateway(), console.session());

    match cmd {
        CallsCommand::Log(args) => {
            let logged = log_call(console, &history, args).await?;
            console.emit(&logged.call, || render_logged(&logged))
        }
        CallsCommand::List(filter) => {
            let calls = history.list(&filter.into()).await?;
            console.emit(&calls, || render_calls(&calls))
        }
        CallsCommand::Show { id } => {
            let call = history.get(&id).await?;
            console.emit(&call, || render_call(&call))
        }
        CallsCommand::Update {
            id,
            duration,
            call_type,
            priority,
            status,
            notes,
            resolution_notes,
        } => {
            let duration = duration
                .as_deref()
                .map(helpline_core::parse_duration)
                .transpose()?;
            let patch = CallPatch {
                duration,
                notes,
                call_type,
                priority,
                status,
                resolution_notes,
            };
            let call = history.update(&id, &patch).await?;
            console.emit(&call, || format!("Updated call {}", call.id))
        }
        CallsCommand::Export { filter, out } => {
            let csv = history.export_csv(&filter.into()).await?;
            tokio::fs::write(&out, &csv)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Wrote {} bytes to {}", csv.len(), out.display());
            Ok(())
        }
        CallsCommand::Stats => {
            let stats = history.stats().await?;
            let summary = helpline_console::DashboardSummary::from_stats(&stats, 0);
            console.emit(&stats, || render_series(&summary))
        }
    }
}

async fn log_call(
    console: &Console,
    history: &CallHistory,
    args: LogArgs,
) -> anyhow::Result<CallLogged> {
    let details = NewContactDetails {
        name: args.contact.name,
        email: args.contact.email,
        company: args.contact.company,
        address: args.contact.address,
    };
    let redirect = match (&args.phone, &args.redirect, &args.event) {
        (_, Some(redirect), _) => Some(Redirect::parse(redirect)?),
        (_, _, Some(event_id)) => Some(history.event(event_id).await?.1),
        _ => None,
    };

    let mut details_saved = false;
    let flow = match redirect {
        Some(redirect) => {
            let entry = match redirect.route {
                // The contact screen comes first; details land on the new contact.
                Route::NewContact if !details.is_empty() => {
                    details_saved = true;
                    create_redirect_contact(console, &redirect, &details).await?
                }
                _ => redirect.entry,
            };
            CallLogFlow::redirected(console.gateway(), console.session(), entry).await?
        }
        None => {
            let flow = CallLogFlow::manual(console.gateway(), console.session())?;
            flow.set_caller_number(args.phone.as_deref().unwrap_or_default())?;
            if let Err(e) = flow.lookup().await {
                tracing::warn!(error = %e, "Contact lookup failed; logging without it");
                eprintln!("Contact lookup failed: {e}");
            }
            flow
        }
    };

    match flow.contact() {
        Some(contact) => eprintln!("Caller: {} ({})", contact.display_name(), contact.id),
        None if flow.phase() == ResolutionPhase::NotFound => {
            eprintln!("No contact for {}; one will be created", flow.caller_number());
        }
        None => {}
    }

    if let Some(duration) = &args.duration {
        flow.reset_stopwatch();
        flow.set_manual_duration(duration)?;
    } else if args.timer || flow.is_stopwatch_running() {
        flow.start_stopwatch();
        eprintln!("Timing call; press Enter to stop");
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("failed to read from stdin")?;
        flow.stop_stopwatch();
        eprintln!("Duration {}", format_duration(flow.elapsed_secs()));
    }

    if !details_saved && !details.is_empty() {
        if flow.contact().is_some() {
            eprintln!("Caller already has a contact; use `contacts update` to change details");
        } else if flow.phase() == ResolutionPhase::NotFound {
            flow.set_new_contact_details(details)?;
        } else {
            bail!(
                "contact details given but {} could not be checked against the directory",
                flow.caller_number()
            );
        }
    }

    flow.edit_form(|form| {
        form.call_type = args.call_type;
        form.priority = args.priority;
        form.status = args.status;
        form.notes = args.notes;
        form.resolution_notes = args.resolution_notes;
    });

    Ok(flow.submit().await?)
}

/// Create the contact a `/contacts/new` redirect asks for and return the
/// call-logging entry it hands off to.
async fn create_redirect_contact(
    console: &Console,
    redirect: &Redirect,
    details: &NewContactDetails,
) -> anyhow::Result<RedirectEntry> {
    let directory = ContactDirectory::new(
        console.gateway(),
        console.session(),
        console.config.search_debounce(),
    )?;
    let form = ContactForm {
        phone_number: redirect.entry.phone.clone(),
        name: details.name.clone(),
        email: details.email.clone(),
        address: details.address.clone(),
        company: details.company.clone(),
        tags: String::new(),
    };
    let (contact, next) = directory.create_from_redirect(&redirect.entry, &form).await?;
    eprintln!("Created contact {} ({})", contact.display_name(), contact.id);
    Ok(next.entry)
}

// ============================================================================
// Events and users
// ============================================================================

async fn run_events(console: &mut Console, cmd: EventsCommand) -> anyhow::Result<()> {
    console.open(Route::Dashboard).await?;
    let history = CallHistory::new(console.gateway(), console.session());

    match cmd {
        EventsCommand::Pending => {
            let events = history.pending_events().await?;
            console.emit(&events, || {
                if events.is_empty() {
                    return "No pending calls".to_string();
                }
                events
                    .iter()
                    .map(|e| {
                        format!(
                            "{:<10} {:<16} {}",
                            e.id,
                            e.phone_number,
                            Redirect::for_event(e).to_path()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        EventsCommand::Show { id } => {
            let (event, redirect) = history.event(&id).await?;
            let path = redirect.to_path();
            console.emit(&event, || {
                format!(
                    "{} from {} ({})\nprocessed: {}\nopen: {path}",
                    event.id, event.phone_number, event.event_type, event.processed
                )
            })
        }
    }
}

async fn run_users(console: &mut Console, cmd: UsersCommand) -> anyhow::Result<()> {
    console.open(Route::Admin).await?;
    let admin = UserAdmin::new(
        console.gateway(),
        console.session(),
        console.config.search_debounce(),
    )?;

    match cmd {
        UsersCommand::List {
            search,
            role,
            status,
        } => {
            if let Some(text) = search {
                admin.search(&text);
            }
            let users = admin.set_filters(role, status).await?;
            console.emit(&users, || render_users(&users))
        }
        UsersCommand::Create {
            name,
            email,
            password,
            role,
        } => {
            let user = admin
                .create(&UserForm {
                    name,
                    email,
                    password,
                    role,
                })
                .await?;
            console.emit(&user, || format!("Created user {} ({})", user.id, user.role))
        }
        UsersCommand::Update { id, name, email } => {
            let user = admin
                .update(
                    &id,
                    &UserPatch {
                        name,
                        email,
                        ..UserPatch::default()
                    },
                )
                .await?;
            console.emit(&user, || format!("Updated user {}", user.id))
        }
        UsersCommand::Toggle { id } => {
            let current = console
                .gateway
                .get_user(&id)
                .await
                .map_err(|e| FlowError::remote(&e, "Failed to load user"))?;
            let user = admin.toggle_status(&current).await?;
            console.emit(&user, || format!("{} is now {}", user.name, user.status))
        }
        UsersCommand::Role { id, role } => {
            let user = admin.change_role(&id, role).await?;
            console.emit(&user, || format!("{} is now {}", user.name, user.role))
        }
        UsersCommand::Delete { id } => {
            admin.delete(&id).await?;
            println!("Deleted user {id}");
            Ok(())
        }
        UsersCommand::ResetPassword {
            id,
            password,
            confirm,
        } => {
            admin.reset_password(&id, &password, &confirm).await?;
            println!("Password reset for {id}");
            Ok(())
        }
        UsersCommand::Stats => {
            let stats = admin.stats().await?;
            console.emit(&stats, || {
                let roles = stats
                    .users
                    .by_role
                    .iter()
                    .map(|(role, n)| format!("{role}: {n}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "users: {} ({} active; {roles})\ncontacts: {}\ncalls: {} ({} in the last 7 days)",
                    stats.users.total,
                    stats.users.active,
                    stats.contacts.total,
                    stats.calls.total,
                    stats.calls.last_7_days
                )
            })
        }
    }
}

// ============================================================================
// Text rendering
// ============================================================================

fn render_contact(contact: &Contact) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    format!(
        "{} ({})\nphone:   {}\nemail:   {}\ncompany: {}\naddress: {}\ntags:    {}",
        contact.display_name(),
        contact.id,
        contact.phone_number,
        field(&contact.email),
        field(&contact.company),
        field(&contact.address),
        format_tags(&contact.tags),
    )
}

fn render_contacts(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return "No contacts found".into();
    }
    contacts
        .iter()
        .map(|c| {
            format!(
                "{:<10} {:<16} {:<24} {}",
                c.id,
                c.phone_number,
                c.display_name(),
                format_tags(&c.tags)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_call(call: &CallRecord) -> String {
    format!(
        "{} {} from {}{}\nagent:    {}\nduration: {}\ntype:     {}\npriority: {}\nstatus:   {}\nnotes:    {}\nresolution: {}",
        call.timestamp.format("%Y-%m-%d %H:%M"),
        call.id,
        call.caller_number,
        call.contact_name
            .as_deref()
            .map(|n| format!(" ({n})"))
            .unwrap_or_default(),
        call.agent_name,
        format_duration(u64::from(call.duration)),
        call.call_type,
        call.priority,
        call.status,
        call.notes.as_deref().unwrap_or("-"),
        call.resolution_notes.as_deref().unwrap_or("-"),
    )
}

fn render_calls(calls: &[CallRecord]) -> String {
    if calls.is_empty() {
        return "No calls found".into();
    }
    calls
        .iter()
        .map(|c| {
            format!(
                "{} {:<10} {:<16} {:<20} {:<10} {:<7} {:<12} {:>6}  {}",
                c.timestamp.format("%Y-%m-%d %H:%M"),
                c.id,
                c.caller_number,
                c.contact_name.as_deref().unwrap_or("-"),
                c.call_type,
                c.priority,
                c.status,
                format_duration(u64::from(c.duration)),
                c.agent_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_logged(logged: &CallLogged) -> String {
    let mut out = format!(
        "Logged call {} ({})",
        logged.call.id,
        format_duration(u64::from(logged.call.duration))
    );
    if let Some(err) = &logged.contact_update_error {
        out.push_str(&format!("\nwarning: contact details not saved: {err}"));
    }
    if logged.event_acknowledged == Some(false) {
        out.push_str("\nwarning: telephony event was not marked processed");
    }
    out.push_str(&format!("\nnext: {}", logged.next));
    out
}

fn render_users(users: &[User]) -> String {
    if users.is_empty() {
        return "No users found".into();
    }
    users
        .iter()
        .map(|u| {
            format!(
                "{:<10} {:<24} {:<32} {:<10} {:<8} {}",
                u.id,
                u.name,
                u.email,
                u.role,
                u.status,
                u.last_login
                    .map_or_else(|| "never".into(), |t| t.format("%Y-%m-%d %H:%M").to_string())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_series(summary: &helpline_console::DashboardSummary) -> String {
    let mut out = String::new();
    for (title, points) in [
        ("By type", &summary.by_type),
        ("By priority", &summary.by_priority),
        ("By status", &summary.by_status),
    ] {
        out.push_str(title);
        out.push('\n');
        for p in points {
            out.push_str(&format!("  {:<12} {:>5} {:>6.1}%\n", p.label, p.count, p.percentage));
        }
    }
    out.trim_end().to_string()
}

fn render_dashboard(summary: &helpline_console::DashboardSummary) -> String {
    let mut out = format!(
        "Calls: {} total, {} today, {} this week, avg {}\nContacts: {}\n",
        summary.total_calls,
        summary.calls_today,
        summary.calls_this_week,
        summary.avg_duration,
        summary.contacts_total
    );
    if let Some(admin) = &summary.admin {
        out.push_str(&format!(
            "Users: {} ({} active), calls in the last 7 days: {}\n",
            admin.users.total, admin.users.active, admin.calls.last_7_days
        ));
    }
    out.push_str(&render_series(summary));
    if !summary.pending_events.is_empty() {
        out.push_str("\nPending calls:");
        for event in &summary.pending_events {
            out.push_str(&format!(
                "\n  {} {}",
                event.phone_number,
                Redirect::for_event(event).to_path()
            ));
        }
    }
    out
}
