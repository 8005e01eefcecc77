use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

mod cli_style;

use cli_style::*;
use media_library_server::library::{LibraryManager, SqliteLibraryStore};
use media_library_server::user::{SqliteUserStore, UserManager, UserRole};

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(|e| format!("Failed to get current dir: {}", e))?
            .join(path)
    };
    if !path.is_dir() {
        return Err(format!("Not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
#[command(styles = get_styles(), about = "Media library maintenance")]
struct CliArgs {
    /// Directory containing library.db and user.db.
    #[clap(long, value_parser = parse_dir)]
    db_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Users(UserCommand),

    /// Category maintenance.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommand,
    },

    /// Links media items without a category id to the category with exactly
    /// the same name as their legacy text.
    LinkCategories {
        #[clap(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Creates a user with the Regular role.
    AddUser {
        name: String,
        email: String,
        password: String,
        /// Also grant the Admin role.
        #[clap(long)]
        admin: bool,
    },

    /// Replaces the password of the user with the given email.
    SetPassword { email: String, password: String },

    /// Adds a role (Admin, Regular) to a user.
    AddRole { email: String, role: String },

    /// Removes a role from a user.
    RemoveRole { email: String, role: String },

    /// Shows all users and their roles.
    ListUsers,
}

#[derive(Subcommand, Debug)]
enum CategoriesCommand {
    /// Migrates legacy category text into categories and merges duplicates.
    /// Runs both steps unless one is selected.
    Cleanup {
        #[clap(long)]
        migrate: bool,
        #[clap(long)]
        duplicates: bool,
        /// Report what would change without writing.
        #[clap(long)]
        dry_run: bool,
    },
}

fn parse_role(role: &str) -> Result<UserRole> {
    match UserRole::from_str(role) {
        Some(role) => Ok(role),
        None => bail!("Invalid role '{}'. Valid roles are: Admin, Regular", role),
    }
}

fn user_manager(db_dir: &std::path::Path) -> Result<UserManager> {
    let store = SqliteUserStore::new(db_dir.join("user.db"))
        .context("Could not open the user database")?;
    Ok(UserManager::new(Arc::new(store)))
}

fn library_manager(db_dir: &std::path::Path) -> Result<LibraryManager> {
    let store = SqliteLibraryStore::new(db_dir.join("library.db"))
        .context("Could not open the library database")?;
    Ok(LibraryManager::new(Arc::new(store)))
}

fn run_users_command(users: &UserManager, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::AddUser {
            name,
            email,
            password,
            admin,
        } => {
            let user = users.add_user(&name, &email, &password)?;
            if admin {
                users.add_user_role(user.id, UserRole::Admin)?;
            }
            print_success(&format!("Created user {} <{}> (id {})", user.name, user.email, user.id));
        }
        UserCommand::SetPassword { email, password } => {
            let profile = users.find_user_by_email(&email)?;
            users.set_password(profile.user.id, &password)?;
            print_success(&format!("Password updated for {}", profile.user.email));
        }
        UserCommand::AddRole { email, role } => {
            let role = parse_role(&role)?;
            let profile = users.find_user_by_email(&email)?;
            users.add_user_role(profile.user.id, role)?;
            print_success(&format!("Role '{}' added to {}", role, profile.user.email));
        }
        UserCommand::RemoveRole { email, role } => {
            let role = parse_role(&role)?;
            let profile = users.find_user_by_email(&email)?;
            users.remove_user_role(profile.user.id, role)?;
            print_success(&format!("Role '{}' removed from {}", role, profile.user.email));
        }
        UserCommand::ListUsers => {
            let profiles = users.list_users()?;
            print_section_header("Users");
            if profiles.is_empty() {
                print_empty_list("(no users)");
                return Ok(());
            }
            let mut table = Table::new(&["id", "name", "email", "roles"]);
            for profile in profiles {
                let roles: Vec<&str> = profile.roles.iter().map(|r| r.as_str()).collect();
                table.add_row(vec![
                    profile.user.id.to_string(),
                    profile.user.name,
                    profile.user.email,
                    roles.join(", "),
                ]);
            }
            table.print();
        }
    }
    Ok(())
}

fn cleanup_categories(
    library: &LibraryManager,
    migrate: bool,
    duplicates: bool,
    dry_run: bool,
) -> Result<()> {
    let run_both = !migrate && !duplicates;
    if dry_run {
        print_warning("Dry run: nothing will be written.");
    }

    if migrate || run_both {
        let report = library.migrate_categories_from_media(dry_run)?;
        print_section_header("Legacy category migration");
        print_key_value("Existing categories", &report.existing_categories.to_string());
        print_key_value(
            if dry_run { "Categories to create" } else { "Categories created" },
            &report.created_categories.to_string(),
        );
        print_key_value(
            if dry_run { "Items to link" } else { "Items linked" },
            &report.linked_items.to_string(),
        );
    }

    if duplicates || run_both {
        print_section_header("Duplicate categories");
        if dry_run {
            let groups = library.find_duplicate_categories()?;
            if groups.is_empty() {
                print_empty_list("(no duplicates)");
            }
            for group in groups {
                print_list_item(&format!(
                    "\"{}\": keep {:?}, merge {:?}",
                    group.name,
                    group.survivor(),
                    group.duplicates()
                ));
            }
        } else {
            let (report, remaining) = library.cleanup_duplicate_categories()?;
            print_key_value("Duplicate groups", &report.groups_found.to_string());
            print_key_value("Categories removed", &report.removed_duplicates.to_string());
            print_key_value("Items relinked", &report.relinked_items.to_string());
            print_key_value("Categories remaining", &remaining.to_string());
            if report.failed_groups > 0 {
                print_error(&format!(
                    "{} groups could not be merged, see the log for details",
                    report.failed_groups
                ));
            }
        }
    }
    Ok(())
}

fn link_categories(library: &LibraryManager, dry_run: bool) -> Result<()> {
    let report = library.link_media_to_categories(dry_run)?;
    print_section_header("Link media to categories");
    print_key_value(
        if dry_run { "Items to link" } else { "Items linked" },
        &report.linked.to_string(),
    );
    if report.unmatched.is_empty() {
        return Ok(());
    }
    print_info(&format!(
        "{} category names have no matching category:",
        report.unmatched.len()
    ));
    for name in &report.unmatched {
        print_list_item(name);
    }
    Ok(())
}

fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Categories {
            command:
                CategoriesCommand::Cleanup {
                    migrate,
                    duplicates,
                    dry_run,
                },
        } => cleanup_categories(&library_manager(&args.db_dir)?, migrate, duplicates, dry_run),
        Command::LinkCategories { dry_run } => {
            link_categories(&library_manager(&args.db_dir)?, dry_run)
        }
        Command::Users(command) => run_users_command(&user_manager(&args.db_dir)?, command),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(err) = run(CliArgs::parse()) {
        print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
