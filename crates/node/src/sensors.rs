//! Fontes de dados do nó: relógio do sistema e sensores simulados.
//!
//! Os sensores simulados reproduzem o comportamento observável do par
//! ICP10101 + ZMOD4410: pressão/temperatura estáveis com leve deriva e
//! sensor de gás devolvendo `NOT_READY` durante o aquecimento.

use chrono::{Datelike, Local, Timelike};
use telemetry_core::acquisition::{Clock, SensorSuite};
use telemetry_core::types::{Measurements, NOT_READY, Timestamp};

/// Pressão ao nível do mar (Pa).
const SEA_LEVEL_PA: f32 = 101_325.0;

/// RTC emulado pelo relógio local do sistema.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> Timestamp {
        let now = Local::now();
        Timestamp::new(
            u16::try_from(now.year()).unwrap_or(0),
            now.month() as u8,
            now.day() as u8,
            now.hour() as u8,
            now.minute() as u8,
            now.second() as u8,
        )
    }
}

/// Sensores determinísticos para bancada sem hardware.
#[derive(Debug, Clone)]
pub struct SimulatedSensors {
    tick: u32,
    warmup_cycles: u32,
}

impl SimulatedSensors {
    /// `warmup_cycles` leituras iniciais saem com o gás em `NOT_READY`.
    pub fn new(warmup_cycles: u32) -> Self {
        Self {
            tick: 0,
            warmup_cycles,
        }
    }
}

impl SensorSuite for SimulatedSensors {
    fn read_all(&mut self) -> Measurements {
        let t = self.tick as f32;
        self.tick = self.tick.wrapping_add(1);

        let pressure = SEA_LEVEL_PA - 120.0 + 15.0 * (t / 60.0).sin();
        let temperature = 24.0 + 0.8 * (t / 300.0).sin();
        let altitude = 44_330.0 * (1.0 - (pressure / SEA_LEVEL_PA).powf(1.0 / 5.255));

        let mut m = Measurements {
            pressure,
            temperature,
            altitude,
            iaq: NOT_READY,
            tvoc: NOT_READY,
            eco2: NOT_READY,
            etoh: NOT_READY,
        };

        if self.tick > self.warmup_cycles {
            m.iaq = 1.5 + 0.3 * (t / 90.0).sin();
            m.tvoc = 0.35 + 0.05 * (t / 45.0).cos();
            m.eco2 = 550.0 + 40.0 * (t / 120.0).sin();
            m.etoh = 0.8 + 0.1 * (t / 30.0).cos();
        }
        m
    }
}
