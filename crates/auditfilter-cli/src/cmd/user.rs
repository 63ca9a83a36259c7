//! `afctl user`: bind users to filters.

use crate::cmd::Context;
use crate::output::{render, text_kv};
use auditfilter_core::AssignmentController;
use auditfilter_core::error::ControllerError;
use auditfilter_core::model::{UserAssignment, UserKey};
use clap::{Args, Subcommand};
use std::io::{self, Write};

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    #[command(
        about = "Assign a filter to a user",
        after_help = "EXAMPLES:\n    # Assign to app@% (host defaults to %)\n    afctl user assign app --filter log_conn\n\n    # Assign the default filter for all other accounts\n    afctl user assign % --filter log_all"
    )]
    Assign(AssignArgs),

    #[command(about = "Point a user's assignment at another filter")]
    Reassign(AssignArgs),

    #[command(about = "Remove a user's assignment")]
    Unassign(UserArgs),

    #[command(about = "Show a user's assignment")]
    Show(UserArgs),

    #[command(
        about = "Adopt an existing assignment",
        after_help = "EXAMPLES:\n    afctl user import app@localhost\n    afctl user import %"
    )]
    Import {
        /// `%` or `username@userhost`.
        #[arg(value_name = "USER_SPEC")]
        user_spec: String,
    },
}

#[derive(Args, Debug)]
pub struct UserArgs {
    /// Account name, or `%` for the default assignment.
    pub username: String,

    /// Host pattern; defaults to `%`. Ignored for the `%` user.
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Args, Debug)]
pub struct AssignArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Filter to assign.
    #[arg(long)]
    pub filter: String,
}

pub fn run(command: &UserCommand, ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let controller = AssignmentController::new(&store);

    match command {
        UserCommand::Assign(args) => {
            let assignment =
                controller.assign(&args.user.username, args.user.host.as_deref(), &args.filter)?;
            render(ctx.output, &assignment, |a, w| {
                writeln!(w, "assigned '{}' to '{}'", a.key(), a.filter_name)
            })
        }
        UserCommand::Reassign(args) => {
            let assignment = controller.reassign(
                &args.user.username,
                args.user.host.as_deref(),
                &args.filter,
            )?;
            render(ctx.output, &assignment, |a, w| {
                writeln!(w, "reassigned '{}' to '{}'", a.key(), a.filter_name)
            })
        }
        UserCommand::Unassign(args) => {
            controller.unassign(&args.username, args.host.as_deref())?;
            let key = UserKey::new(args.username.as_str(), args.host.as_deref());
            render(
                ctx.output,
                &serde_json::json!({ "user": key.spec(), "unassigned": true }),
                |_, w| writeln!(w, "unassigned '{key}'"),
            )
        }
        UserCommand::Show(args) => {
            let assignment = controller
                .read(&args.username, args.host.as_deref())?
                .ok_or_else(|| {
                    ControllerError::AssignmentNotFound(
                        UserKey::new(args.username.as_str(), args.host.as_deref()).spec(),
                    )
                })?;
            render(ctx.output, &assignment, write_assignment)
        }
        UserCommand::Import { user_spec } => {
            let assignment = controller.import(user_spec)?;
            render(ctx.output, &assignment, |a, w| {
                writeln!(w, "imported assignment '{}'", a.key())?;
                write_assignment(a, w)
            })
        }
    }
}

fn write_assignment(assignment: &UserAssignment, w: &mut dyn Write) -> io::Result<()> {
    text_kv(w, "username", &assignment.username)?;
    text_kv(w, "userhost", &assignment.userhost)?;
    text_kv(w, "filter", &assignment.filter_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(subcommand)]
        command: UserCommand,
    }

    #[test]
    fn assign_parses_host_and_filter() {
        let w = Wrapper::parse_from(["test", "assign", "app", "--host", "10.0.0.%", "--filter", "conn"]);
        match w.command {
            UserCommand::Assign(args) => {
                assert_eq!(args.user.username, "app");
                assert_eq!(args.user.host.as_deref(), Some("10.0.0.%"));
                assert_eq!(args.filter, "conn");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn assign_requires_filter() {
        assert!(Wrapper::try_parse_from(["test", "assign", "app"]).is_err());
    }

    #[test]
    fn assignment_text_lists_fields() {
        let assignment = UserAssignment::new(UserKey::new("app", None), "conn");
        let mut buf = Vec::new();
        write_assignment(&assignment, &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("userhost:    %"));
        assert!(text.contains("filter:      conn"));
    }
}
