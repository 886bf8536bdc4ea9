//! protojs shell
//!
//! Interactive object shell and script runner. Each line is one command;
//! `help` lists them. Set `RUST_LOG=protojs=debug` to watch the runtime.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use ahash::AHashMap;
use regex::{Captures, Regex};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use protojs::builtins::json;
use protojs::{Context, ObjectRef, PropertyDescriptor, RuntimeError, Value};

const HELP: &str = "\
commands:
  let <name> [: <proto>|null]          create an object (default prototype: root)
  def <obj>.<key> = <json> [ro] [hidden] [fixed]
                                       define an own data property
  set <obj>.<key> = <json>             assign through the prototype chain
  get <obj>.<key>                      read through the prototype chain
  del <obj>.<key>                      delete an own property
  keys <obj>                           own enumerable keys
  forin <obj>                          enumerable keys along the chain
  own <obj>.<key>                      own property descriptor
  json <obj>                           snapshot own enumerable data
  proto <obj> [= <proto>|null]         show or change the prototype
  help                                 this text
  quit                                 leave the shell";

/// Failure of a single shell command
#[derive(Debug)]
enum CommandError {
    /// The runtime rejected the operation
    Runtime(RuntimeError),
    /// Malformed command or unknown name
    Usage(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Runtime(e) => write!(f, "{}", e),
            CommandError::Usage(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for CommandError {}

impl From<RuntimeError> for CommandError {
    fn from(e: RuntimeError) -> Self {
        CommandError::Runtime(e)
    }
}

type CommandResult = Result<Option<String>, CommandError>;

#[derive(Debug, Clone, Copy)]
enum Command {
    Let,
    Def,
    Set,
    Get,
    Del,
    Keys,
    ForIn,
    Own,
    Json,
    Proto,
    Help,
    Quit,
}

/// Command grammar, tried in order
struct Grammar {
    rules: Vec<(Command, Regex)>,
}

impl Grammar {
    fn new() -> Result<Self, regex::Error> {
        const NAME: &str = r"[A-Za-z_$][\w$]*";
        let path = format!(r"(?P<obj>{NAME})\.(?P<key>{NAME})");
        let patterns = [
            (Command::Let, format!(r"^let\s+(?P<name>{NAME})(?:\s*:\s*(?P<proto>{NAME}))?$")),
            (
                Command::Def,
                format!(r"^def\s+{path}\s*=\s*(?P<json>.+?)(?P<flags>(?:\s+(?:ro|hidden|fixed))*)$"),
            ),
            (Command::Set, format!(r"^set\s+{path}\s*=\s*(?P<json>.+)$")),
            (Command::Get, format!(r"^get\s+{path}$")),
            (Command::Del, format!(r"^del\s+{path}$")),
            (Command::Keys, format!(r"^keys\s+(?P<obj>{NAME})$")),
            (Command::ForIn, format!(r"^forin\s+(?P<obj>{NAME})$")),
            (Command::Own, format!(r"^own\s+{path}$")),
            (Command::Json, format!(r"^json\s+(?P<obj>{NAME})$")),
            (
                Command::Proto,
                format!(r"^proto\s+(?P<obj>{NAME})(?:\s*=\s*(?P<proto>{NAME}))?$"),
            ),
            (Command::Help, r"^help$".to_string()),
            (Command::Quit, r"^(?:quit|exit)$".to_string()),
        ];

        let mut rules = Vec::with_capacity(patterns.len());
        for (command, pattern) in patterns {
            rules.push((command, Regex::new(&pattern)?));
        }
        Ok(Grammar { rules })
    }

    fn parse<'t>(&self, line: &'t str) -> Option<(Command, Captures<'t>)> {
        self.rules
            .iter()
            .find_map(|(command, re)| re.captures(line).map(|caps| (*command, caps)))
    }
}

/// Shell state: the context plus the objects bound to names
struct Shell {
    ctx: Context,
    grammar: Grammar,
    names: AHashMap<String, ObjectRef>,
    done: bool,
}

impl Shell {
    fn new() -> Result<Self, regex::Error> {
        let ctx = Context::new();
        let mut names = AHashMap::new();
        names.insert("root".to_string(), ctx.root().clone());
        Ok(Shell {
            ctx,
            grammar: Grammar::new()?,
            names,
            done: false,
        })
    }

    fn object(&self, name: &str) -> Result<ObjectRef, CommandError> {
        self.names
            .get(name)
            .cloned()
            .ok_or_else(|| CommandError::Usage(format!("unknown object '{}'", name)))
    }

    /// `null` means no prototype
    fn proto(&self, name: &str) -> Result<Option<ObjectRef>, CommandError> {
        if name == "null" {
            Ok(None)
        } else {
            self.object(name).map(Some)
        }
    }

    /// Name an object if the shell knows it, otherwise show its data
    fn show(&self, value: &Value) -> Result<String, CommandError> {
        match value {
            Value::Object(obj) => {
                if let Some((name, _)) = self.names.iter().find(|(_, o)| o.ptr_eq(obj)) {
                    return Ok(format!("<{}>", name));
                }
                Ok(json::stringify(obj)?)
            }
            Value::String(s) => Ok(format!("{:?}", s)),
            other => Ok(other.to_string()),
        }
    }

    fn execute(&mut self, line: &str) -> CommandResult {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let Some((command, caps)) = self.grammar.parse(line) else {
            return Err(CommandError::Usage(format!(
                "unrecognized command '{}' (try 'help')",
                line
            )));
        };
        let cap = |name: &str| caps.name(name).map_or("", |m| m.as_str());

        match command {
            Command::Let => {
                let proto = match caps.name("proto") {
                    Some(m) => self.proto(m.as_str())?,
                    None => Some(self.ctx.root().clone()),
                };
                let obj = self.ctx.create(proto.as_ref());
                self.names.insert(cap("name").to_string(), obj);
                Ok(None)
            }
            Command::Def => {
                let obj = self.object(cap("obj"))?;
                let value = json::parse_value(cap("json"))?;
                let flags: Vec<&str> = cap("flags").split_whitespace().collect();
                let descriptor = PropertyDescriptor::data(value)
                    .writable(!flags.contains(&"ro"))
                    .enumerable(!flags.contains(&"hidden"))
                    .configurable(!flags.contains(&"fixed"));
                obj.define_property(cap("key"), descriptor)?;
                Ok(None)
            }
            Command::Set => {
                let obj = self.object(cap("obj"))?;
                let value = json::parse_value(cap("json"))?;
                self.ctx.put(&obj, cap("key"), value)?;
                Ok(None)
            }
            Command::Get => {
                let obj = self.object(cap("obj"))?;
                let value = self.ctx.get(&obj, cap("key"))?;
                Ok(Some(self.show(&value)?))
            }
            Command::Del => {
                let obj = self.object(cap("obj"))?;
                Ok(Some(obj.delete(cap("key"))?.to_string()))
            }
            Command::Keys => {
                let obj = self.object(cap("obj"))?;
                Ok(Some(obj.own_enumerable_keys().join(", ")))
            }
            Command::ForIn => {
                let obj = self.object(cap("obj"))?;
                Ok(Some(self.ctx.enumerate_all(&obj)?.join(", ")))
            }
            Command::Own => {
                let obj = self.object(cap("obj"))?;
                let Some(desc) = obj.get_own_property_descriptor(cap("key")) else {
                    return Ok(Some("undefined".to_string()));
                };
                let payload = match desc.value() {
                    Some(value) => format!("value: {}, writable: {}", self.show(value)?, desc.is_writable()),
                    None => format!(
                        "get: {}, set: {}",
                        desc.get_fn().is_some(),
                        desc.set_fn().is_some()
                    ),
                };
                Ok(Some(format!(
                    "{{ {}, enumerable: {}, configurable: {} }}",
                    payload,
                    desc.is_enumerable(),
                    desc.is_configurable()
                )))
            }
            Command::Json => {
                let obj = self.object(cap("obj"))?;
                Ok(Some(json::stringify(&obj)?))
            }
            Command::Proto => {
                let obj = self.object(cap("obj"))?;
                if let Some(m) = caps.name("proto") {
                    let proto = self.proto(m.as_str())?;
                    obj.set_prototype_of(proto.as_ref())?;
                    return Ok(None);
                }
                match obj.get_prototype_of() {
                    Some(proto) => Ok(Some(self.show(&Value::Object(proto))?)),
                    None => Ok(Some("null".to_string())),
                }
            }
            Command::Help => Ok(Some(HELP.to_string())),
            Command::Quit => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".protojs_history"))
}

fn run_file(shell: &mut Shell, filename: &str) -> Result<(), Box<dyn Error>> {
    let source = std::fs::read_to_string(filename)
        .map_err(|e| format!("Error reading {}: {}", filename, e))?;

    for (lineno, line) in source.lines().enumerate() {
        match shell.execute(line) {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(e) => return Err(format!("{}:{}: {}", filename, lineno + 1, e).into()),
        }
        if shell.done {
            break;
        }
    }
    Ok(())
}

fn run_repl(shell: &mut Shell) -> Result<(), Box<dyn Error>> {
    println!("protojs object shell");
    println!("Type 'help' for commands, Ctrl+D to exit.\n");

    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        // Missing on first run
        let _ = rl.load_history(path);
    }

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                match shell.execute(&line) {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(e) => println!("Error: {}", e),
                }
                if shell.done {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            tracing::warn!(%e, "could not save history");
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut shell = Shell::new()?;
    match std::env::args().nth(1) {
        Some(filename) => run_file(&mut shell, &filename),
        None => run_repl(&mut shell),
    }
}
