use anyhow::{Result, anyhow};
use log::{info, warn};

use crate::element::ElementId;

/// Platform effect behind a gaze activation.
pub trait Actuator {
    fn click(&mut self, id: ElementId) -> Result<()>;
    fn toggle(&mut self, id: ElementId) -> Result<()>;
    fn select(&mut self, id: ElementId) -> Result<()>;
    fn expand_collapse(&mut self, id: ElementId) -> Result<()>;
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn click(&mut self, id: ElementId) -> Result<()> {
        (**self).click(id)
    }
    fn toggle(&mut self, id: ElementId) -> Result<()> {
        (**self).toggle(id)
    }
    fn select(&mut self, id: ElementId) -> Result<()> {
        (**self).select(id)
    }
    fn expand_collapse(&mut self, id: ElementId) -> Result<()> {
        (**self).expand_collapse(id)
    }
}

/// Dry-run actuator: only reports what would have been activated.
#[derive(Debug, Default)]
pub struct LogActuator;

impl Actuator for LogActuator {
    fn click(&mut self, id: ElementId) -> Result<()> {
        info!("dry-run: click {id}");
        Ok(())
    }
    fn toggle(&mut self, id: ElementId) -> Result<()> {
        info!("dry-run: toggle {id}");
        Ok(())
    }
    fn select(&mut self, id: ElementId) -> Result<()> {
        info!("dry-run: select {id}");
        Ok(())
    }
    fn expand_collapse(&mut self, id: ElementId) -> Result<()> {
        info!("dry-run: expand/collapse {id}");
        Ok(())
    }
}

/// Activations become synthetic left clicks on a virtual uinput mouse; the
/// gaze pointer already sits over the element.
pub struct UinputActuator {
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputActuator {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self { linux: None })
        }
    }

    pub fn noop() -> Self {
        Self { linux: None }
    }

    pub fn click_mouse(&mut self, which: &str) -> Result<()> {
        let which = which.to_ascii_lowercase();
        if !matches!(which.as_str(), "left" | "right" | "middle") {
            return Err(anyhow!("unknown mouse button: {which}"));
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            match which.as_str() {
                "left" => dev.click_left()?,
                "right" => dev.click_right()?,
                _ => dev.click_middle()?,
            }
        }
        Ok(())
    }
}

impl Actuator for UinputActuator {
    fn click(&mut self, id: ElementId) -> Result<()> {
        info!("activate {id}: click");
        self.click_mouse("left")
    }
    fn toggle(&mut self, id: ElementId) -> Result<()> {
        info!("activate {id}: toggle");
        self.click_mouse("left")
    }
    fn select(&mut self, id: ElementId) -> Result<()> {
        info!("activate {id}: select");
        self.click_mouse("left")
    }
    fn expand_collapse(&mut self, id: ElementId) -> Result<()> {
        info!("activate {id}: expand/collapse");
        self.click_mouse("left")
    }
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{controller::Mouse, relative};

        let dev = uinput::default()?
            .name("Dwellctl Virtual Pointer")?
            // relative axes so the device registers as a mouse
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?
            .create()?;

        info!("uinput: created virtual pointer");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn press_release(&mut self, button: uinput::event::controller::Mouse) -> Result<()> {
        self.dev.send(button, 1)?;
        self.sync()?;
        self.dev.send(button, 0)?;
        self.sync()
    }

    fn click_left(&mut self) -> Result<()> {
        self.press_release(uinput::event::controller::Mouse::Left)
    }
    fn click_right(&mut self) -> Result<()> {
        self.press_release(uinput::event::controller::Mouse::Right)
    }
    fn click_middle(&mut self) -> Result<()> {
        self.press_release(uinput::event::controller::Mouse::Middle)
    }
}
