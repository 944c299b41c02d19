//! Text control surface.
//!
//! `ConsoleSurface` is the `ControlSurface` the playground mounts schemas on;
//! it prints each new schema and keeps a copy, with reflected values, in a
//! `SharedView`. A reader thread parses stdin commands against that copy and
//! sends `ControlEvent`s stamped with the copy's generation, so a command
//! typed against an outdated schema is dropped by the panel.
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use catalog::{ControlKind, ControlValue};
use crossbeam_channel::Sender;
use engine::controls::{IMPORT_SETTINGS, PRESET_SAVE};
use engine::{param_control_id, Control, ControlEvent, ControlSchema, ControlSurface, Widget, WidgetInput};
use renderer::WindowControl;
use tracing::debug;

const HELP: &str = "\
commands:
  set <control> <value>   change a slider, toggle, color, tuple, select or text field
  toggle <control>        flip a toggle
  press <control>         press a button (reset, presets.apply.<id>, export.copy, ...)
  pick <control> <path>   load a texture file
  clear <control>         unbind a texture
  save <name>             save the current values as a preset
  import <path>           apply an exported settings file
  schema                  print the current controls
  help                    show this message
  quit                    close the preview
controls may be named by id (param.uSpeed) or by parameter key (uSpeed)";

#[derive(Debug, Default)]
struct ConsoleView {
    schema: ControlSchema,
    reflected: HashMap<String, WidgetInput>,
}

/// Last mounted schema, shared between the surface and the reader thread.
#[derive(Debug, Clone, Default)]
pub struct SharedView(Arc<Mutex<ConsoleView>>);

impl SharedView {
    fn lock(&self) -> MutexGuard<'_, ConsoleView> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn generation(&self) -> u64 {
        self.lock().schema.generation()
    }

    pub fn render(&self) -> String {
        let view = self.lock();
        render_schema(&view.schema, &view.reflected)
    }

    /// Resolves a parsed command into an event for the mounted schema.
    pub fn event_for(&self, command: &ConsoleCommand) -> Result<ControlEvent, String> {
        let view = self.lock();
        let generation = view.schema.generation();
        let (control, input) = match command {
            ConsoleCommand::Set { control, value } => {
                let control = find_control(&view.schema, control)?;
                (control.id.clone(), input_for_set(control, value)?)
            }
            ConsoleCommand::Toggle { control } => {
                let control = find_control(&view.schema, control)?;
                let current = match current_value(&view, control) {
                    Some(ControlValue::Toggle(on)) => on,
                    _ if is_toggle(control) => false,
                    _ => return Err(format!("'{}' is not a toggle", control.id)),
                };
                (
                    control.id.clone(),
                    WidgetInput::Value(ControlValue::Toggle(!current)),
                )
            }
            ConsoleCommand::Press { control } => {
                let control = find_control(&view.schema, control)?;
                (control.id.clone(), WidgetInput::Press)
            }
            ConsoleCommand::Pick { control, path } => {
                let control = find_control(&view.schema, control)?;
                (
                    control.id.clone(),
                    WidgetInput::Value(ControlValue::File(Some(path.clone()))),
                )
            }
            ConsoleCommand::Clear { control } => {
                let control = find_control(&view.schema, control)?;
                (control.id.clone(), WidgetInput::Value(ControlValue::File(None)))
            }
            ConsoleCommand::Save { name } => {
                (PRESET_SAVE.to_string(), WidgetInput::Text(name.clone()))
            }
            ConsoleCommand::ImportJson { json } => {
                (IMPORT_SETTINGS.to_string(), WidgetInput::Text(json.clone()))
            }
            other => return Err(format!("{other:?} does not address a control")),
        };
        Ok(ControlEvent::new(generation, control, input))
    }
}

/// Prints mounted schemas and records reflected values.
pub struct ConsoleSurface {
    view: SharedView,
    echo: bool,
}

impl ConsoleSurface {
    pub fn new(view: SharedView, echo: bool) -> Self {
        Self { view, echo }
    }
}

impl ControlSurface for ConsoleSurface {
    fn mount(&mut self, schema: &ControlSchema) {
        {
            let mut view = self.view.lock();
            view.schema = schema.clone();
            view.reflected.clear();
        }
        if self.echo {
            println!("{}", self.view.render());
        }
    }

    fn reflect(&mut self, generation: u64, updates: &[(String, WidgetInput)]) {
        let mut view = self.view.lock();
        if generation != view.schema.generation() {
            debug!(generation, "ignoring reflection for an unmounted schema");
            return;
        }
        for (control, input) in updates {
            view.reflected.insert(control.clone(), input.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Set { control: String, value: String },
    Toggle { control: String },
    Press { control: String },
    Pick { control: String, path: String },
    Clear { control: String },
    Save { name: String },
    Import { path: PathBuf },
    ImportJson { json: String },
    Schema,
    Help,
    Quit,
}

/// Parses one input line; blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let (target, argument) = match rest.split_once(char::is_whitespace) {
        Some((target, argument)) => (target.to_string(), argument.trim().to_string()),
        None => (rest.to_string(), String::new()),
    };
    let need = |what: &str, value: &str| {
        if value.is_empty() {
            Err(format!("{verb}: missing {what}"))
        } else {
            Ok(())
        }
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "set" => {
            need("control", &target)?;
            need("value", &argument)?;
            ConsoleCommand::Set {
                control: target,
                value: argument,
            }
        }
        "toggle" => {
            need("control", &target)?;
            ConsoleCommand::Toggle { control: target }
        }
        "press" => {
            need("control", &target)?;
            ConsoleCommand::Press { control: target }
        }
        "pick" => {
            need("control", &target)?;
            need("path", &argument)?;
            ConsoleCommand::Pick {
                control: target,
                path: argument,
            }
        }
        "clear" => {
            need("control", &target)?;
            ConsoleCommand::Clear { control: target }
        }
        "save" => {
            need("preset name", rest)?;
            ConsoleCommand::Save {
                name: rest.to_string(),
            }
        }
        "import" => {
            need("path", rest)?;
            ConsoleCommand::Import {
                path: PathBuf::from(rest),
            }
        }
        "schema" | "ls" => ConsoleCommand::Schema,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}'; type 'help'")),
    };
    Ok(Some(command))
}

/// What the reader thread needs from the window it drives.
pub trait ConsoleLink {
    fn wake(&self) -> bool;
    fn quit(&self) -> bool;
}

impl ConsoleLink for WindowControl {
    fn wake(&self) -> bool {
        WindowControl::wake(self)
    }

    fn quit(&self) -> bool {
        WindowControl::quit(self)
    }
}

pub fn spawn(
    view: SharedView,
    sender: Sender<ControlEvent>,
    link: WindowControl,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("shaderlab-console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let stdout = io::stdout();
            drive(stdin.lock(), stdout.lock(), &view, &sender, &link);
        })
}

/// Reads commands until EOF, `quit`, or until the window stops listening.
pub fn drive<R, W, L>(input: R, mut output: W, view: &SharedView, sender: &Sender<ControlEvent>, link: &L)
where
    R: BufRead,
    W: Write,
    L: ConsoleLink,
{
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                let _ = writeln!(output, "{message}");
                continue;
            }
        };

        let command = match command {
            ConsoleCommand::Schema => {
                let _ = writeln!(output, "{}", view.render());
                continue;
            }
            ConsoleCommand::Help => {
                let _ = writeln!(output, "{HELP}");
                continue;
            }
            ConsoleCommand::Quit => {
                link.quit();
                break;
            }
            ConsoleCommand::Import { path } => match fs::read_to_string(&path) {
                Ok(json) => ConsoleCommand::ImportJson { json },
                Err(err) => {
                    let _ = writeln!(output, "import: cannot read {}: {err}", path.display());
                    continue;
                }
            },
            other => other,
        };

        match view.event_for(&command) {
            Ok(event) => {
                if sender.send(event).is_err() || !link.wake() {
                    break;
                }
            }
            Err(message) => {
                let _ = writeln!(output, "{message}");
            }
        }
    }
    debug!("console input closed");
}

fn find_control<'a>(schema: &'a ControlSchema, name: &str) -> Result<&'a Control, String> {
    schema
        .find(name)
        .or_else(|| schema.find(&param_control_id(name)))
        .ok_or_else(|| format!("no control named '{name}'; type 'schema'"))
}

fn is_toggle(control: &Control) -> bool {
    matches!(
        control.widget,
        Widget::Parameter {
            control: ControlKind::Toggle,
            ..
        }
    )
}

fn current_value(view: &ConsoleView, control: &Control) -> Option<ControlValue> {
    match view.reflected.get(&control.id) {
        Some(WidgetInput::Value(value)) => Some(value.clone()),
        _ => match &control.widget {
            Widget::Parameter { value, .. } => value.clone(),
            _ => None,
        },
    }
}

fn input_for_set(control: &Control, raw: &str) -> Result<WidgetInput, String> {
    match &control.widget {
        Widget::Select { options, .. } => {
            if options.iter().any(|option| option.value == raw) {
                Ok(WidgetInput::Choose(raw.to_string()))
            } else {
                let values: Vec<_> = options.iter().map(|option| option.value.as_str()).collect();
                Err(format!("'{raw}' is not one of: {}", values.join(", ")))
            }
        }
        Widget::TextEntry { .. } => Ok(WidgetInput::Text(raw.to_string())),
        Widget::Button => Err(format!("'{}' is a button; use press", control.id)),
        Widget::Note => Err(format!("'{}' is not editable", control.id)),
        Widget::Parameter { control: kind, .. } => {
            let value = match kind {
                ControlKind::Toggle => ControlValue::Toggle(parse_bool(raw)?),
                ControlKind::Slider { .. } => ControlValue::Number(parse_number(raw)?),
                ControlKind::ColorPicker => ControlValue::Color(raw.to_string()),
                ControlKind::NumberTuple { len } => ControlValue::Tuple(parse_tuple(raw, *len)?),
                ControlKind::FilePicker => ControlValue::File(Some(raw.to_string())),
            };
            Ok(WidgetInput::Value(value))
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(format!("expected on/off, got '{other}'")),
    }
}

fn parse_number(raw: &str) -> Result<f32, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("expected a number, got '{}'", raw.trim()))
}

fn parse_tuple(raw: &str, len: usize) -> Result<Vec<f32>, String> {
    let parts: Vec<f32> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(parse_number)
        .collect::<Result<_, _>>()?;
    if parts.len() != len {
        return Err(format!("expected {len} numbers, got {}", parts.len()));
    }
    Ok(parts)
}

fn render_schema(schema: &ControlSchema, reflected: &HashMap<String, WidgetInput>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "-- controls (schema {}) --", schema.generation());
    for group in schema.groups() {
        let _ = writeln!(out, "[{}]", group.title);
        let mut folder: Option<&str> = None;
        for control in &group.controls {
            if control.folder.as_deref() != folder {
                folder = control.folder.as_deref();
                if let Some(name) = folder {
                    let _ = writeln!(out, "  {name}/");
                }
            }
            let indent = if folder.is_some() { "    " } else { "  " };
            let _ = writeln!(
                out,
                "{indent}{:<28} {:<20} {}",
                control.id,
                control.label,
                describe_widget(control, reflected.get(&control.id))
            );
        }
    }
    out
}

fn describe_widget(control: &Control, reflected: Option<&WidgetInput>) -> String {
    match &control.widget {
        Widget::Select { options, selected } => {
            let selected = match reflected {
                Some(WidgetInput::Choose(value)) => value,
                _ => selected,
            };
            options
                .iter()
                .map(|option| {
                    if &option.value == selected {
                        format!("[{}]", option.value)
                    } else {
                        option.value.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        }
        Widget::Parameter { control: kind, value } => {
            let value = match reflected {
                Some(WidgetInput::Value(value)) => Some(value),
                _ => value.as_ref(),
            };
            let shown = value.map(describe_value).unwrap_or_else(|| "-".to_string());
            match kind {
                ControlKind::Slider { min, max, .. } => format!("{shown} ({min}..{max})"),
                _ => shown,
            }
        }
        Widget::Button => "(press)".to_string(),
        Widget::TextEntry { placeholder } => format!("<{placeholder}>"),
        Widget::Note => String::new(),
    }
}

fn describe_value(value: &ControlValue) -> String {
    match value {
        ControlValue::Toggle(on) => if *on { "on" } else { "off" }.to_string(),
        ControlValue::Number(number) => format!("{number}"),
        ControlValue::Color(hex) => hex.clone(),
        ControlValue::Tuple(values) => values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        ControlValue::File(Some(path)) => path.clone(),
        ControlValue::File(None) => "(none)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;

    use catalog::{Catalog, ParameterKind, ParameterSpec, ParameterValue, ShaderDescriptor};
    use crossbeam_channel::unbounded;
    use engine::{ControlPanel, ParameterStore};

    struct StubLink {
        quit: Cell<bool>,
    }

    impl ConsoleLink for StubLink {
        fn wake(&self) -> bool {
            true
        }

        fn quit(&self) -> bool {
            self.quit.set(true);
            true
        }
    }

    fn mounted_view() -> SharedView {
        let descriptor = ShaderDescriptor::new(
            "demo",
            "Demo",
            "",
            "",
            "uniform float uSpeed;\nuniform bool uInvert;\nuniform vec2 uCenter;\nvoid main() {}\n",
            vec![
                ParameterSpec::scalar("uSpeed", 1.0).with_range(0.0, 4.0, None),
                ParameterSpec::new("uInvert", ParameterKind::Boolean, ParameterValue::Boolean(false)),
                ParameterSpec::new(
                    "uCenter",
                    ParameterKind::Vector2,
                    ParameterValue::Vector2([0.5, 0.5]),
                ),
            ],
        )
        .unwrap();
        let mut catalog = Catalog::new();
        catalog.insert(descriptor);
        let mut store = ParameterStore::new(Arc::new(catalog));
        store.select_shader("demo");
        let mut panel = ControlPanel::new();
        panel.sync(&store, &[]);

        let view = SharedView::default();
        let mut surface = ConsoleSurface::new(view.clone(), false);
        surface.mount(panel.schema());
        view
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            parse_command("set uSpeed 2.5").unwrap(),
            Some(ConsoleCommand::Set {
                control: "uSpeed".into(),
                value: "2.5".into()
            })
        );
        assert_eq!(
            parse_command("  pick param.uTex  /tmp/a b.png ").unwrap(),
            Some(ConsoleCommand::Pick {
                control: "param.uTex".into(),
                path: "/tmp/a b.png".into()
            })
        );
        assert_eq!(
            parse_command("save my look").unwrap(),
            Some(ConsoleCommand::Save {
                name: "my look".into()
            })
        );
        assert_eq!(parse_command("   ").unwrap(), None);
        assert!(parse_command("set uSpeed").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn set_resolves_bare_parameter_keys() {
        let view = mounted_view();
        let command = parse_command("set uSpeed 2").unwrap().unwrap();
        let event = view.event_for(&command).unwrap();

        assert_eq!(event.generation, view.generation());
        assert_eq!(event.control, param_control_id("uSpeed"));
        assert_eq!(event.input, WidgetInput::Value(ControlValue::Number(2.0)));
    }

    #[test]
    fn toggle_flips_the_last_known_value() {
        let view = mounted_view();
        let toggle = ConsoleCommand::Toggle {
            control: "uInvert".into(),
        };
        let event = view.event_for(&toggle).unwrap();
        assert_eq!(event.input, WidgetInput::Value(ControlValue::Toggle(true)));

        let mut surface = ConsoleSurface::new(view.clone(), false);
        surface.reflect(
            view.generation(),
            &[(event.control.clone(), event.input.clone())],
        );
        let event = view.event_for(&toggle).unwrap();
        assert_eq!(event.input, WidgetInput::Value(ControlValue::Toggle(false)));
    }

    #[test]
    fn tuple_values_must_match_the_arity() {
        let view = mounted_view();
        let ok = view
            .event_for(&ConsoleCommand::Set {
                control: "uCenter".into(),
                value: "0.25, 0.75".into(),
            })
            .unwrap();
        assert_eq!(
            ok.input,
            WidgetInput::Value(ControlValue::Tuple(vec![0.25, 0.75]))
        );
        assert!(view
            .event_for(&ConsoleCommand::Set {
                control: "uCenter".into(),
                value: "1 2 3".into(),
            })
            .is_err());
    }

    #[test]
    fn unknown_controls_are_reported() {
        let view = mounted_view();
        let err = view
            .event_for(&ConsoleCommand::Press {
                control: "nope".into(),
            })
            .unwrap_err();
        assert!(err.contains("nope"));
    }

    #[test]
    fn rendered_schema_lists_parameter_controls() {
        let view = mounted_view();
        let text = view.render();
        assert!(text.contains("[Scene]"));
        assert!(text.contains("param.uSpeed"));
        assert!(text.contains("(0..4)"));
    }

    #[test]
    fn drive_sends_events_and_stops_on_quit() {
        let view = mounted_view();
        let (sender, receiver) = unbounded();
        let link = StubLink {
            quit: Cell::new(false),
        };
        let input = b"set uSpeed 3\nbogus\nquit\nset uSpeed 4\n";
        let mut output = Vec::new();

        drive(&input[..], &mut output, &view, &sender, &link);

        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].input, WidgetInput::Value(ControlValue::Number(3.0)));
        assert!(link.quit.get());
        assert!(String::from_utf8(output).unwrap().contains("unknown command"));
    }
}
