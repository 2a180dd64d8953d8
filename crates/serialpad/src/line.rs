//! Serial line settings and raw-mode terminal configuration.

use std::{io, mem, os::fd::RawFd};

use config::SerialConfig;
use keypad_engine::{Error, Result};

/// Parity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Validated line settings for a serial keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    /// Line speed in bits per second.
    pub baud_rate: u32,
    /// Parity mode.
    pub parity: Parity,
    /// Two stop bits instead of one.
    pub two_stop_bits: bool,
    /// Data bits per character (5-8).
    pub size: u8,
}

impl LineSettings {
    /// Validate `cfg`.
    pub fn from_config(cfg: &SerialConfig) -> Result<Self> {
        let parity = match cfg.parity.as_str() {
            "N" | "n" => Parity::None,
            "E" | "e" => Parity::Even,
            "O" | "o" => Parity::Odd,
            other => {
                return Err(Error::Config(format!(
                    "unsupported parity '{other}' (expected N, E or O)"
                )));
            }
        };
        let two_stop_bits = match cfg.stop_bits {
            1 => false,
            2 => true,
            n => return Err(Error::Config(format!("unsupported stop bits {n}"))),
        };
        if !(5..=8).contains(&cfg.size) {
            return Err(Error::Config(format!(
                "unsupported character size {}",
                cfg.size
            )));
        }
        if speed(cfg.baud_rate).is_none() {
            return Err(Error::Config(format!(
                "unsupported baud rate {}",
                cfg.baud_rate
            )));
        }
        Ok(Self {
            baud_rate: cfg.baud_rate,
            parity,
            two_stop_bits,
            size: cfg.size,
        })
    }
}

/// Map a numeric baud rate to its termios speed constant.
fn speed(baud: u32) -> Option<libc::speed_t> {
    Some(match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        _ => return None,
    })
}

/// True if `fd` refers to a terminal.
pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) == 1 }
}

/// Put the terminal on `fd` in raw mode with `settings`.
///
/// Reads return after at most a tenth of a second even when no byte arrived,
/// so a blocked reader notices cancellation.
pub fn configure(fd: RawFd, settings: &LineSettings) -> io::Result<()> {
    let speed = speed(settings.baud_rate)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "unsupported baud rate"))?;
    let mut t: libc::termios = unsafe { mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut t) } != 0 {
        return Err(io::Error::last_os_error());
    }
    unsafe {
        libc::cfmakeraw(&mut t);
        libc::cfsetispeed(&mut t, speed);
        libc::cfsetospeed(&mut t, speed);
    }

    t.c_cflag &= !libc::CSIZE;
    t.c_cflag |= match settings.size {
        5 => libc::CS5,
        6 => libc::CS6,
        7 => libc::CS7,
        _ => libc::CS8,
    };
    match settings.parity {
        Parity::None => t.c_cflag &= !(libc::PARENB | libc::PARODD),
        Parity::Even => {
            t.c_cflag |= libc::PARENB;
            t.c_cflag &= !libc::PARODD;
        }
        Parity::Odd => t.c_cflag |= libc::PARENB | libc::PARODD,
    }
    if settings.two_stop_bits {
        t.c_cflag |= libc::CSTOPB;
    } else {
        t.c_cflag &= !libc::CSTOPB;
    }
    t.c_cflag |= libc::CLOCAL | libc::CREAD;
    t.c_cc[libc::VMIN] = 0;
    t.c_cc[libc::VTIME] = 1;

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &t) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = LineSettings::from_config(&SerialConfig::default()).unwrap();
        assert_eq!(s.baud_rate, 9600);
        assert_eq!(s.parity, Parity::None);
        assert!(!s.two_stop_bits);
        assert_eq!(s.size, 8);
    }

    #[test]
    fn rejects_unsupported_settings() {
        let base = SerialConfig::default();
        for bad in [
            SerialConfig {
                parity: "M".into(),
                ..base.clone()
            },
            SerialConfig {
                stop_bits: 3,
                ..base.clone()
            },
            SerialConfig {
                size: 9,
                ..base.clone()
            },
            SerialConfig {
                baud_rate: 1234,
                ..base.clone()
            },
        ] {
            assert!(matches!(
                LineSettings::from_config(&bad),
                Err(Error::Config(_))
            ));
        }
    }

    #[test]
    fn odd_parity_two_stop_bits() {
        let s = LineSettings::from_config(&SerialConfig {
            parity: "O".into(),
            stop_bits: 2,
            size: 7,
            baud_rate: 115_200,
            ..SerialConfig::default()
        })
        .unwrap();
        assert_eq!(s.parity, Parity::Odd);
        assert!(s.two_stop_bits);
    }
}
