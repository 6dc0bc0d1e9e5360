use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::element::{Element, ElementId};

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Phase delays, all in milliseconds of accumulated gaze time.
#[derive(Debug, Clone, Deserialize)]
pub struct Timings {
    pub enter_ms: u64,
    pub fixation_ms: u64,
    pub dwell_ms: u64,
    pub repeat_delay_ms: u64,
    /// Horizon of precisely tracked time; older time spills into overflow.
    pub history_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repeat {
    #[serde(default)]
    pub max_dwell_repeat_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub timings: Timings,
    pub repeat: Repeat,

    // keys are element ids written as strings: `42 = 3`
    #[serde(default, deserialize_with = "deserialize_element_overrides")]
    pub elements: HashMap<ElementId, u32>,
}

fn deserialize_element_overrides<'de, D>(
    de: D,
) -> std::result::Result<HashMap<ElementId, u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, u32>::deserialize(de)?;
    let mut out = HashMap::with_capacity(raw.len());
    for (k, v) in raw {
        let id: u64 = k.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("element override key '{k}' is not an element id"))
        })?;
        out.insert(ElementId(id), v);
    }
    Ok(out)
}

impl Profile {
    /// Element property wins over the profile table, which wins over the default.
    pub fn max_dwell_repeat_count(&self, element: &Element) -> u32 {
        element
            .max_dwell_repeat_count
            .or_else(|| self.elements.get(&element.id).copied())
            .unwrap_or(self.repeat.max_dwell_repeat_count)
    }

    pub fn enter_delay(&self) -> Duration {
        Duration::from_millis(self.timings.enter_ms)
    }
    pub fn fixation_delay(&self) -> Duration {
        Duration::from_millis(self.timings.fixation_ms)
    }
    pub fn dwell_delay(&self) -> Duration {
        Duration::from_millis(self.timings.dwell_ms)
    }
    pub fn repeat_delay(&self) -> Duration {
        Duration::from_millis(self.timings.repeat_delay_ms)
    }
    pub fn history_horizon(&self) -> Duration {
        Duration::from_millis(self.timings.history_ms)
    }

    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }
}

impl Default for Profile {
    fn default() -> Self {
        // the bundled profile is validated by tests
        Self {
            meta: Meta {
                name: Some("default".to_string()),
            },
            timings: Timings {
                enter_ms: 50,
                fixation_ms: 350,
                dwell_ms: 400,
                repeat_delay_ms: 400,
                history_ms: 3000,
            },
            repeat: Repeat {
                max_dwell_repeat_count: 0,
            },
            elements: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("dwellctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    /// Load a profile by name without switching the active pointer.
    pub fn load_named(&self, name: &str) -> Result<Profile> {
        load_profile(&self.profiles_dir, name)
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "timings": {
                "enter_ms": self.profile.timings.enter_ms,
                "fixation_ms": self.profile.timings.fixation_ms,
                "dwell_ms": self.profile.timings.dwell_ms,
                "repeat_delay_ms": self.profile.timings.repeat_delay_ms,
                "history_ms": self.profile.timings.history_ms,
            },
            "max_dwell_repeat_count": self.profile.repeat.max_dwell_repeat_count,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn load_profile(dir: &Path, name: &str) -> Result<Profile> {
    let path = dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn validate_profile(p: &Profile) -> Result<()> {
    let t = &p.timings;
    if t.dwell_ms == 0 || t.repeat_delay_ms == 0 {
        return Err(anyhow!("timings.dwell_ms and timings.repeat_delay_ms must be positive"));
    }
    if t.history_ms == 0 {
        return Err(anyhow!("timings.history_ms must be positive"));
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::TargetKind;

    #[test]
    fn test_bundled_profile_parses() {
        let p = Profile::parse(default_profile_text()).unwrap();
        assert_eq!(p.meta.name.as_deref(), Some("default"));
        assert!(p.timings.dwell_ms > 0);
    }

    #[test]
    fn test_element_overrides() {
        let p = Profile::parse(
            r#"
            [meta]
            name = "typing"
            [timings]
            enter_ms = 50
            fixation_ms = 300
            dwell_ms = 500
            repeat_delay_ms = 250
            history_ms = 3000
            [repeat]
            max_dwell_repeat_count = 1
            [elements]
            42 = 5
            "#,
        )
        .unwrap();

        let plain = Element::new(1, TargetKind::Button);
        let listed = Element::new(42, TargetKind::Button);
        let own = Element::new(42, TargetKind::Button).with_max_repeat(9);
        assert_eq!(p.max_dwell_repeat_count(&plain), 1);
        assert_eq!(p.max_dwell_repeat_count(&listed), 5);
        assert_eq!(p.max_dwell_repeat_count(&own), 9);
    }

    #[test]
    fn test_rejects_zero_dwell() {
        let err = Profile::parse(
            r#"
            [meta]
            [timings]
            enter_ms = 0
            fixation_ms = 0
            dwell_ms = 0
            repeat_delay_ms = 100
            history_ms = 100
            [repeat]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("dwell_ms"));
    }

    #[test]
    fn test_doctor_reports_all_timings() {
        let mut profile = Profile::default();
        profile.timings.history_ms = 4500;
        let cfg = ConfigState {
            active_name: "default".to_string(),
            profile,
            config_dir: PathBuf::from("/tmp/dwellctl"),
            profiles_dir: PathBuf::from("/tmp/dwellctl/profiles"),
            active_ptr: PathBuf::from("/tmp/dwellctl/active"),
        };
        let report = cfg.doctor_report();
        let timings = &report["timings"];
        assert_eq!(timings["enter_ms"], 50);
        assert_eq!(timings["dwell_ms"], 400);
        assert_eq!(timings["history_ms"], 4500);
        assert_eq!(report["max_dwell_repeat_count"], 0);
        assert_eq!(report["active_profile"], "default");
    }

    #[test]
    fn test_rejects_bad_override_key() {
        let res = Profile::parse(
            r#"
            [meta]
            [timings]
            enter_ms = 0
            fixation_ms = 0
            dwell_ms = 10
            repeat_delay_ms = 10
            history_ms = 10
            [repeat]
            [elements]
            ok = 2
            "#,
        );
        assert!(res.is_err());
    }
}
