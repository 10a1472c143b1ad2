//! Сетка клеток оверворлда и общие операции над полями
//!
//! Все стадии читают поля через функции этого модуля: координаты за пределами карты
//! зажимаются к краю, дробные позиции читаются билинейно.

use serde::{Deserialize, Serialize};

/// Одна клетка оверворлда
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Нормализованная высота, всегда в 0.0..=1.0
    pub elevation: f32,
    /// Множитель эрозии (1.0 = не тронуто), только убывает при эрозии
    pub erosion: f32,
    /// Поправка выветривания, добавляется к высоте
    pub weathering: f32,
    /// Маска разломов (0.0..=1.0)
    pub faults: f32,
    pub temperature: f32,
    pub rainfall: f32,
    /// Индекс в таблице биомов, 0 = не назначен
    pub biome: u8,
    /// 0 = ничья, иначе 1-based номер фракции
    pub faction: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            elevation: 0.0,
            erosion: 1.0,
            weathering: 0.0,
            faults: 1.0,
            temperature: 0.0,
            rainfall: 0.0,
            biome: 0,
            faction: 0,
        }
    }
}

/// Каналы клетки, доступные внешним потребителям сетки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Elevation,
    Temperature,
    Rainfall,
    Biome,
    Faction,
    Erosion,
    Weathering,
    Faults,
}

impl Cell {
    #[must_use]
    pub fn channel(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Elevation => self.elevation,
            Channel::Temperature => self.temperature,
            Channel::Rainfall => self.rainfall,
            Channel::Biome => f32::from(self.biome),
            Channel::Faction => f32::from(self.faction),
            Channel::Erosion => self.erosion,
            Channel::Weathering => self.weathering,
            Channel::Faults => self.faults,
        }
    }

    /// Записывает скалярное поле. Для `Biome`/`Faction` значение округляется и зажимается в байт.
    pub fn set_channel(&mut self, channel: Channel, value: f32) {
        match channel {
            Channel::Elevation => self.elevation = value,
            Channel::Temperature => self.temperature = value,
            Channel::Rainfall => self.rainfall = value,
            Channel::Biome => self.biome = value.round().clamp(0.0, 255.0) as u8,
            Channel::Faction => self.faction = value.round().clamp(0.0, 255.0) as u8,
            Channel::Erosion => self.erosion = value,
            Channel::Weathering => self.weathering = value,
            Channel::Faults => self.faults = value,
        }
    }

    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.faction != 0
    }
}

/// Двумерная сетка клеток, хранится построчно
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<Cell>,
}

impl Grid {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    /// Клетка по координатам; `None` за пределами карты
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<&Cell> {
        if x < self.width && y < self.height {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// Клетка с зажатием координат к краю карты
    #[must_use]
    pub fn get_clamped(&self, x: i64, y: i64) -> &Cell {
        let cx = x.clamp(0, i64::from(self.width) - 1) as u32;
        let cy = y.clamp(0, i64::from(self.height) - 1) as u32;
        &self.cells[self.index(cx, cy)]
    }

    #[must_use]
    pub fn elevation(&self, x: u32, y: u32) -> Option<f32> {
        self.get(x, y).map(|c| c.elevation)
    }

    #[must_use]
    pub fn temperature(&self, x: u32, y: u32) -> Option<f32> {
        self.get(x, y).map(|c| c.temperature)
    }

    #[must_use]
    pub fn rainfall(&self, x: u32, y: u32) -> Option<f32> {
        self.get(x, y).map(|c| c.rainfall)
    }

    #[must_use]
    pub fn biome(&self, x: u32, y: u32) -> Option<u8> {
        self.get(x, y).map(|c| c.biome)
    }

    #[must_use]
    pub fn faction(&self, x: u32, y: u32) -> Option<u8> {
        self.get(x, y).map(|c| c.faction)
    }

    /// Копия одного канала всей сетки
    #[must_use]
    pub fn channel(&self, channel: Channel) -> Vec<f32> {
        self.cells.iter().map(|c| c.channel(channel)).collect()
    }

    pub fn set_channel(&mut self, channel: Channel, values: &[f32]) {
        debug_assert_eq!(values.len(), self.cells.len());
        for (cell, &v) in self.cells.iter_mut().zip(values) {
            cell.set_channel(channel, v);
        }
    }

    /// Билинейное чтение произвольной величины клетки в дробной позиции
    #[must_use]
    pub fn sample_by(&self, x: f32, y: f32, value: impl Fn(&Cell) -> f32) -> f32 {
        bilinear_by(self.width, self.height, x, y, |i| value(&self.cells[i]))
    }

    /// Копирует крайние строки и столбцы из ближайших внутренних соседей,
    /// подавляя артефакты на границе карты.
    pub fn copy_borders(&mut self) {
        let w = self.width;
        let h = self.height;
        if w < 3 || h < 3 {
            return;
        }
        for y in 0..h {
            let left = self.cells[self.index(1, y)];
            let right = self.cells[self.index(w - 2, y)];
            let li = self.index(0, y);
            let ri = self.index(w - 1, y);
            self.cells[li] = left;
            self.cells[ri] = right;
        }
        for x in 0..w {
            let top = self.cells[self.index(x, 1)];
            let bottom = self.cells[self.index(x, h - 2)];
            let ti = self.index(x, 0);
            let bi = self.index(x, h - 1);
            self.cells[ti] = top;
            self.cells[bi] = bottom;
        }
    }
}

/// Билинейное чтение плоского поля `width × height` в дробной позиции.
#[must_use]
pub fn bilinear(data: &[f32], width: u32, height: u32, x: f32, y: f32) -> f32 {
    bilinear_by(width, height, x, y, |i| data[i])
}

/// Общая билинейная интерполяция.
///
/// Обе угловые координаты зажимаются в `[0, dim - 2]`; если углы совпали
/// (целая позиция или зажатие у края), второй угол сдвигается на +1,
/// чтобы ячейка интерполяции не была вырожденной.
pub fn bilinear_by(width: u32, height: u32, x: f32, y: f32, value: impl Fn(usize) -> f32) -> f32 {
    let w = width as usize;
    if width < 2 || height < 2 {
        let cx = x.clamp(0.0, (width.max(1) - 1) as f32) as usize;
        let cy = y.clamp(0.0, (height.max(1) - 1) as f32) as usize;
        return value(cy * w + cx);
    }

    let (x0, x1) = corners(x, width);
    let (y0, y1) = corners(y, height);

    let tx = (x - x0 as f32).clamp(0.0, 1.0);
    let ty = (y - y0 as f32).clamp(0.0, 1.0);

    let v00 = value(y0 * w + x0);
    let v10 = value(y0 * w + x1);
    let v01 = value(y1 * w + x0);
    let v11 = value(y1 * w + x1);

    let top = v00 + (v10 - v00) * tx;
    let bottom = v01 + (v11 - v01) * tx;
    top + (bottom - top) * ty
}

fn corners(v: f32, dim: u32) -> (usize, usize) {
    let max = (dim - 2) as f32;
    let lo = v.floor().clamp(0.0, max) as usize;
    let mut hi = v.ceil().clamp(0.0, max) as usize;
    if hi == lo {
        hi = lo + 1;
    }
    (lo, hi)
}

/// Направления 4-связности в фиксированном порядке: запад, восток, север, юг.
pub const NEIGHBORS_4: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Направления 8-связности
pub const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
