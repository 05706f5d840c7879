/// How the remainder of a slash command is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArgKind {
    None,
    /// Everything after the command, verbatim.
    Text,
    /// One shell-quoted path.
    Path,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct SessionCommand {
    pub name: &'static str,
    pub action: &'static str,
    pub arg: ArgKind,
}

const fn command(name: &'static str, action: &'static str, arg: ArgKind) -> SessionCommand {
    SessionCommand { name, action, arg }
}

pub(crate) const SESSION_COMMANDS: &[SessionCommand] = &[
    command("intent", "set_intent", ArgKind::Text),
    command("edit", "refine", ArgKind::Text),
    command("upload", "upload", ArgKind::Path),
    command("export", "export", ArgKind::Path),
    command("back", "back", ArgKind::None),
    command("skip", "skip", ArgKind::None),
    command("retry", "retry", ArgKind::None),
    command("done", "done", ArgKind::None),
    command("next", "done", ArgKind::None),
    command("another", "create_another", ArgKind::None),
    command("phase", "show_phase", ArgKind::None),
    command("quit", "quit", ArgKind::None),
    command("exit", "quit", ArgKind::None),
    command("help", "help", ArgKind::None),
];

pub(crate) fn lookup(name: &str) -> Option<&'static SessionCommand> {
    SESSION_COMMANDS.iter().find(|spec| spec.name == name)
}

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/upload",
    "/intent",
    "/skip",
    "/back",
    "/retry",
    "/edit",
    "/done",
    "/export",
    "/another",
    "/phase",
    "/quit",
];
