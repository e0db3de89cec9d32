//! Command-line front end for the client organizer core.
//!
//! # Responsibility
//! - Run client edits through the same detail view model a GUI would use,
//!   including conflict and delete confirmations on the terminal.

mod dialogs;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clientorg_core::model::{lock, shared};
use clientorg_core::repo::lookup_repo::LookupDataService;
use clientorg_core::view_model::DeleteOutcome;
use clientorg_core::{
    init_logging, AppConfig, ClientDetailViewModel, Company, EntityId, Repository, SaveOutcome,
    Session,
};
use dialogs::ConsoleDialogs;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clientorg")]
#[command(about = "Manage clients, companies and meetings", version)]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database file; overrides the configuration.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Answer every confirmation with OK.
    #[arg(long, short = 'y', global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lists clients.
    List,
    /// Lists companies.
    Companies,
    /// Shows one client with its phone numbers.
    Show {
        id: EntityId,
    },
    /// Creates a client.
    AddClient {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        company: Option<EntityId>,
        #[arg(long = "phone")]
        phones: Vec<String>,
    },
    /// Edits fields of an existing client.
    Edit {
        id: EntityId,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Phone number to append.
        #[arg(long = "add-phone")]
        add_phones: Vec<String>,
        /// Position (0-based) of a phone number to remove.
        #[arg(long = "remove-phone")]
        remove_phone: Option<usize>,
    },
    /// Deletes a client unless it takes part in a meeting.
    Delete {
        id: EntityId,
    },
    /// Creates a company.
    AddCompany {
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(db) = cli.db.clone() {
        config = config.database_path(db);
    }
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir).context("failed to start logging")?;
    }

    let session = Session::open(&config).context("failed to open database")?;
    let dialogs = Arc::new(ConsoleDialogs::new(cli.yes));
    info!("event=cli_command module=cli status=start");

    match cli.command {
        Command::List => list_clients(&session).await,
        Command::Companies => list_companies(&session).await,
        Command::Show { id } => {
            let mut vm = session.client_detail(dialogs);
            vm.load(id).await?;
            print_client(&vm);
            Ok(())
        }
        Command::AddClient {
            first_name,
            last_name,
            email,
            company,
            phones,
        } => {
            let mut vm = session.client_detail(dialogs);
            vm.load(0).await?;
            let detail = vm.behavior_mut();
            if let Some(client) = detail.client_mut() {
                client.set_first_name(first_name);
                client.set_last_name(last_name.unwrap_or_default());
                client.set_email(email.unwrap_or_default());
                client.set_company_id(company);
            }
            for number in phones {
                set_new_phone(&mut vm, number);
            }
            save(&mut vm).await
        }
        Command::Edit {
            id,
            first_name,
            last_name,
            email,
            add_phones,
            remove_phone,
        } => {
            let mut vm = session.client_detail(dialogs);
            vm.load(id).await?;
            let detail = vm.behavior_mut();
            if let Some(index) = remove_phone {
                detail.select_phone_number(Some(index));
                if !detail.remove_phone_number() {
                    bail!("client {id} has no phone number at position {index}");
                }
            }
            if let Some(client) = detail.client_mut() {
                if let Some(first_name) = first_name {
                    client.set_first_name(first_name);
                }
                if let Some(last_name) = last_name {
                    client.set_last_name(last_name);
                }
                if let Some(email) = email {
                    client.set_email(email);
                }
            }
            for number in add_phones {
                set_new_phone(&mut vm, number);
            }
            save(&mut vm).await
        }
        Command::Delete { id } => {
            let mut vm = session.client_detail(dialogs);
            vm.load(id).await?;
            match vm.delete().await? {
                DeleteOutcome::Deleted => println!("deleted client {id}"),
                DeleteOutcome::Cancelled => println!("delete cancelled"),
                DeleteOutcome::Blocked => {}
            }
            Ok(())
        }
        Command::AddCompany { name } => {
            let repo = session.company_repository();
            let company = shared(Company::new(name));
            repo.add(Arc::clone(&company));
            repo.save().await?;
            println!("added company {}", lock(&company).id);
            Ok(())
        }
    }
}

fn set_new_phone(vm: &mut ClientDetailViewModel, number: String) {
    let detail = vm.behavior_mut();
    if let Some(index) = detail.add_phone_number() {
        if let Some(phone) = detail.phone_number_mut(index) {
            phone.set_number(number);
        }
    }
}

async fn save(vm: &mut ClientDetailViewModel) -> Result<()> {
    if !vm.save_enabled() {
        report_errors(vm);
        bail!("nothing to save or the client is invalid");
    }
    match vm.save().await? {
        SaveOutcome::Saved { id } => println!("saved client {id}: {}", vm.title()),
        SaveOutcome::Reloaded => print_client(vm),
        SaveOutcome::DeletedInStore | SaveOutcome::NotExecuted => {}
    }
    Ok(())
}

fn report_errors(vm: &ClientDetailViewModel) {
    let detail = vm.behavior();
    if let Some(client) = detail.client() {
        for property in ["first_name", "last_name", "email"] {
            for message in client.errors(property) {
                eprintln!("{property}: {message}");
            }
        }
    }
    for (index, phone) in detail.phone_numbers().enumerate() {
        for message in phone.errors("number") {
            eprintln!("phone {index}: {message}");
        }
    }
}

fn print_client(vm: &ClientDetailViewModel) {
    let detail = vm.behavior();
    let Some(client) = detail.client() else {
        return;
    };
    println!("#{} {}", client.id(), vm.title());
    if let Some(email) = client.email() {
        println!("  email: {email}");
    }
    let companies = detail.companies();
    let company = companies
        .iter()
        .find(|item| item.id == client.company_id())
        .map(|item| item.display_member.as_str())
        .unwrap_or_default();
    println!("  company: {company}");
    for (index, phone) in detail.phone_numbers().enumerate() {
        println!("  phone {index}: {}", phone.number());
    }
}

async fn list_clients(session: &Session) -> Result<()> {
    for item in session.lookups().client_lookup().await? {
        if let Some(id) = item.id {
            println!("{id}\t{}", item.display_member);
        }
    }
    Ok(())
}

async fn list_companies(session: &Session) -> Result<()> {
    for item in session.lookups().company_lookup().await? {
        if let Some(id) = item.id {
            println!("{id}\t{}", item.display_member);
        }
    }
    Ok(())
}
