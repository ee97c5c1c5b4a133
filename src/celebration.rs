use rand::seq::SliceRandom;
use rand::Rng;
use std::time::{Duration, Instant};

const GRAVITY: f64 = 12.0;
const SYMBOLS: [char; 6] = ['*', '+', '•', '✦', '◆', '✓'];
const BANNERS: [&str; 5] = ["MEMORIZED!", "NAILED IT!", "FLAWLESS!", "COMMITTED!", "LOCKED IN!"];

/// One confetti piece, in terminal cell coordinates
#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub symbol: char,
    pub color_index: usize,
    pub age: f64,
    pub max_age: f64,
}

impl Particle {
    fn burst<R: Rng>(x: f64, y: f64, rng: &mut R) -> Self {
        Self {
            x,
            y,
            vel_x: rng.gen_range(-6.0..6.0),
            vel_y: rng.gen_range(-9.0..-3.0),
            symbol: *SYMBOLS.choose(rng).unwrap_or(&'*'),
            color_index: rng.gen_range(0..7),
            age: 0.0,
            max_age: rng.gen_range(1.5..3.0),
        }
    }

    /// Advance by `dt` seconds; false once the particle has expired.
    fn update(&mut self, dt: f64) -> bool {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
        self.vel_y += GRAVITY * dt;
        self.vel_x *= 0.98;
        self.age += dt;
        self.age < self.max_age
    }

    /// 1.0 when fresh, 0.0 when about to expire
    pub fn life(&self) -> f64 {
        (1.0 - self.age / self.max_age).clamp(0.0, 1.0)
    }
}

/// Completion animation: confetti bursting from the lower corners with a
/// banner in the middle of the screen.
#[derive(Debug)]
pub struct Celebration {
    pub particles: Vec<Particle>,
    pub banner: &'static str,
    pub duration: Duration,
    pub is_active: bool,
    width: f64,
    height: f64,
    started_at: Instant,
    last_update: Instant,
}

impl Celebration {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            particles: Vec::new(),
            banner: BANNERS[0],
            duration: Duration::from_millis(2_500),
            is_active: false,
            width: 80.0,
            height: 24.0,
            started_at: now,
            last_update: now,
        }
    }

    pub fn start(&mut self, width: u16, height: u16) {
        self.start_at(width, height, Instant::now());
    }

    pub fn start_at(&mut self, width: u16, height: u16, now: Instant) {
        let mut rng = rand::thread_rng();
        self.width = f64::from(width);
        self.height = f64::from(height);
        self.started_at = now;
        self.last_update = now;
        self.is_active = true;
        self.banner = BANNERS.choose(&mut rng).copied().unwrap_or(BANNERS[0]);

        self.particles.clear();
        let bottom = self.height - 1.0;
        for origin_x in [0.0, self.width - 1.0] {
            for _ in 0..30 {
                let mut p = Particle::burst(origin_x, bottom, &mut rng);
                // aim each burst toward the middle
                p.vel_x = p.vel_x.abs() * if origin_x == 0.0 { 1.0 } else { -1.0 };
                self.particles.push(p);
            }
        }
    }

    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    pub fn update_at(&mut self, now: Instant) {
        if !self.is_active {
            return;
        }

        if now.saturating_duration_since(self.started_at) >= self.duration {
            self.stop();
            return;
        }

        let dt = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.last_update = now;

        let (width, height) = (self.width, self.height);
        self.particles.retain_mut(|p| {
            let alive = p.update(dt);
            let on_screen = p.x >= -2.0 && p.x <= width + 2.0 && p.y <= height + 2.0;
            alive && on_screen
        });
    }

    pub fn stop(&mut self) {
        self.is_active = false;
        self.particles.clear();
    }
}

impl Default for Celebration {
    fn default() -> Self {
        Self::new()
    }
}
