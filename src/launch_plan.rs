use std::path::{Path, PathBuf};

use crate::{
    backend_config::{EndpointTarget, SupervisorConfig},
    DeploymentMode, Error, Result, DEV_ENTRY_SCRIPT, DEV_ENV_DIR, PACKAGED_BACKEND_DIR,
    PACKAGED_BACKEND_NAME,
};

/// Where the two deployment shapes keep their files.
#[derive(Debug, Clone, Default)]
pub struct LaunchLayout {
    /// Development checkout holding `app.py` and the `tallyenv` environment.
    pub source_dir: Option<PathBuf>,
    /// Installed application resource directory.
    pub resource_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub mode: DeploymentMode,
}

impl LaunchPlan {
    pub fn for_mode(
        mode: DeploymentMode,
        layout: &LaunchLayout,
        endpoint: &EndpointTarget,
    ) -> Result<Self> {
        match mode {
            DeploymentMode::Development => {
                let source_dir = layout
                    .source_dir
                    .as_deref()
                    .ok_or(Error::SourceDirNotFound)?;
                Ok(Self {
                    cmd: path_arg(&source_dir.join(dev_interpreter_relative())),
                    args: vec![
                        "-m".to_string(),
                        "streamlit".to_string(),
                        "run".to_string(),
                        path_arg(&source_dir.join(DEV_ENTRY_SCRIPT)),
                        "--server.headless".to_string(),
                        "true".to_string(),
                        "--server.port".to_string(),
                        endpoint.port().to_string(),
                    ],
                    cwd: source_dir.to_path_buf(),
                    mode,
                })
            }
            DeploymentMode::Packaged => {
                let resource_dir = layout
                    .resource_dir
                    .as_deref()
                    .ok_or(Error::ResourceDirNotFound)?;
                let backend_dir = resource_dir
                    .join(PACKAGED_BACKEND_DIR)
                    .join(PACKAGED_BACKEND_NAME);
                Ok(Self {
                    cmd: path_arg(&backend_dir.join(packaged_backend_file_name())),
                    args: Vec::new(),
                    cwd: backend_dir,
                    mode,
                })
            }
        }
    }

    pub fn from_custom_command(raw: &str, cwd: PathBuf, mode: DeploymentMode) -> Result<Self> {
        let mut pieces =
            shlex::split(raw).ok_or_else(|| Error::InvalidCommand(raw.to_string()))?;
        if pieces.is_empty() {
            return Err(Error::InvalidCommand("command is empty".to_string()));
        }

        let cmd = pieces.remove(0);
        Ok(Self {
            cmd,
            args: pieces,
            cwd,
            mode,
        })
    }

    /// Paths are checked up front; bare program names are left to the `PATH` lookup.
    pub fn executable_to_verify(&self) -> Option<&Path> {
        let cmd = Path::new(&self.cmd);
        if cmd.components().count() > 1 || cmd.is_absolute() {
            Some(cmd)
        } else {
            None
        }
    }

    pub fn debug_command(&self) -> Vec<String> {
        let mut parts = vec![self.cmd.clone()];
        parts.extend(self.args.iter().cloned());
        parts
    }
}

/// A custom command from configuration takes precedence over the mode's fixed layout.
pub fn resolve_launch_plan(
    config: &SupervisorConfig,
    mode: DeploymentMode,
    layout: &LaunchLayout,
) -> Result<LaunchPlan> {
    if let Some(custom_command) = config.custom_command.as_deref() {
        let cwd = config
            .cwd_override
            .clone()
            .or_else(|| layout.source_dir.clone())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        return LaunchPlan::from_custom_command(custom_command, cwd, mode);
    }

    let mut plan = LaunchPlan::for_mode(mode, layout, &config.endpoint)?;
    if let Some(cwd) = &config.cwd_override {
        plan.cwd = cwd.clone();
    }
    Ok(plan)
}

pub fn dev_interpreter_relative() -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from(DEV_ENV_DIR).join("Scripts").join("python.exe")
    } else {
        PathBuf::from(DEV_ENV_DIR).join("bin").join("python")
    }
}

pub fn packaged_backend_file_name() -> String {
    if cfg!(target_os = "windows") {
        format!("{PACKAGED_BACKEND_NAME}.exe")
    } else {
        PACKAGED_BACKEND_NAME.to_string()
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> LaunchLayout {
        LaunchLayout {
            source_dir: Some(PathBuf::from("/work/tally")),
            resource_dir: Some(PathBuf::from("/opt/tally/resources")),
        }
    }

    #[test]
    fn for_mode_selects_fixed_command_per_mode() {
        let endpoint = EndpointTarget::default();
        let source_dir = PathBuf::from("/work/tally");
        let backend_dir = PathBuf::from("/opt/tally/resources")
            .join("dist")
            .join("tally-ai-backend");

        let cases = [
            (
                DeploymentMode::Development,
                source_dir.join(dev_interpreter_relative()),
                vec![
                    "-m".to_string(),
                    "streamlit".to_string(),
                    "run".to_string(),
                    path_arg(&source_dir.join("app.py")),
                    "--server.headless".to_string(),
                    "true".to_string(),
                    "--server.port".to_string(),
                    "8501".to_string(),
                ],
                source_dir.clone(),
            ),
            (
                DeploymentMode::Packaged,
                backend_dir.join(packaged_backend_file_name()),
                Vec::new(),
                backend_dir.clone(),
            ),
        ];

        for (mode, expected_cmd, expected_args, expected_cwd) in cases {
            let plan = LaunchPlan::for_mode(mode, &layout(), &endpoint).unwrap();
            assert_eq!(plan.cmd, path_arg(&expected_cmd), "mode={mode}");
            assert_eq!(plan.args, expected_args, "mode={mode}");
            assert_eq!(plan.cwd, expected_cwd, "mode={mode}");
            assert_eq!(plan.mode, mode);
        }
    }

    #[test]
    fn development_port_follows_endpoint() {
        let plan = LaunchPlan::for_mode(
            DeploymentMode::Development,
            &layout(),
            &EndpointTarget::new("127.0.0.1", 9100),
        )
        .unwrap();
        assert_eq!(plan.args.last().map(String::as_str), Some("9100"));
    }

    #[test]
    fn interpreter_lives_inside_isolated_environment() {
        let relative = dev_interpreter_relative();
        assert!(relative.starts_with(DEV_ENV_DIR));
        if cfg!(target_os = "windows") {
            assert!(relative.ends_with("Scripts/python.exe"));
        } else {
            assert!(relative.ends_with("bin/python"));
        }
    }

    #[test]
    fn missing_layout_dirs_are_reported() {
        let empty = LaunchLayout::default();
        let endpoint = EndpointTarget::default();
        assert!(matches!(
            LaunchPlan::for_mode(DeploymentMode::Development, &empty, &endpoint),
            Err(Error::SourceDirNotFound)
        ));
        assert!(matches!(
            LaunchPlan::for_mode(DeploymentMode::Packaged, &empty, &endpoint),
            Err(Error::ResourceDirNotFound)
        ));
    }

    #[test]
    fn custom_command_is_split_like_a_shell() {
        let plan = LaunchPlan::from_custom_command(
            "python -m streamlit run \"my app.py\" --server.port 8501",
            PathBuf::from("/srv"),
            DeploymentMode::Development,
        )
        .unwrap();
        assert_eq!(plan.cmd, "python");
        assert_eq!(
            plan.args,
            vec!["-m", "streamlit", "run", "my app.py", "--server.port", "8501"]
        );
        assert!(plan.executable_to_verify().is_none());
    }

    #[test]
    fn custom_command_rejects_unbalanced_quotes_and_empty_input() {
        for raw in ["python \"app.py", "   "] {
            assert!(matches!(
                LaunchPlan::from_custom_command(raw, PathBuf::from("."), DeploymentMode::Packaged),
                Err(Error::InvalidCommand(_))
            ));
        }
    }

    #[test]
    fn resolve_prefers_custom_command_and_cwd_override() {
        let config = SupervisorConfig {
            custom_command: Some("uv run app.py".to_string()),
            cwd_override: Some(PathBuf::from("/srv/override")),
            ..SupervisorConfig::default()
        };
        let plan = resolve_launch_plan(&config, DeploymentMode::Packaged, &layout()).unwrap();
        assert_eq!(plan.debug_command(), vec!["uv", "run", "app.py"]);
        assert_eq!(plan.cwd, PathBuf::from("/srv/override"));
        assert_eq!(plan.mode, DeploymentMode::Packaged);
    }

    #[test]
    fn resolve_without_custom_command_uses_mode_layout() {
        let config = SupervisorConfig::default();
        let plan = resolve_launch_plan(&config, DeploymentMode::Packaged, &layout()).unwrap();
        assert!(plan.args.is_empty());
        assert!(plan.executable_to_verify().is_some());
    }
}
