//! Arena — a small deterministic top-down game driven one input per tick.
//!
//! The graph deliberately touches every snapshot category:
//!   - scalars on every entity
//!   - the tile map (opaque by configuration) and the texture atlas (opaque handle)
//!   - one SimRng shared by the arena and every patrol script (cloned, shared)
//!   - enemy and projectile lists (containers), kill counts (mapping)
//!   - a patrol script per enemy that closes over its enemy (suspended, cyclic)
//!   - the volatile root fields `raw_pressed_keys`, `net`, `cheating_detected`
//!     (excluded, never rolled back)
//!
//! RULE: All randomness flows through the arena's SimRng.

use crate::{
    classify::ClassifierTable,
    error::{RewindError, RewindResult},
    live::{
        entity_mut, entity_ref, resource_mut, resource_ref, unknown_field, CaptureFn, Coroutine,
        Entity, Field, Frame, Key, MapRef, ObjRef, Resource, ResourceRef, RestoreFn, Seq, SeqKind,
        SeqRef, Value,
    },
    rng::SimRng,
    simulation::Simulation,
    types::{NodeId, Tick},
};
use serde::{Deserialize, Serialize};
use std::{
    any::Any,
    cell::RefCell,
    collections::BTreeMap,
    rc::{Rc, Weak},
};

pub const WIDTH: f64 = 16.0;
pub const HEIGHT: f64 = 12.0;
pub const PLAYER_HP: i64 = 5;
pub const ENEMY_HP: i64 = 2;
pub const FIRE_COOLDOWN: i64 = 4;
pub const PROJECTILE_SPEED: f64 = 2.0;
pub const PROJECTILE_TTL: i64 = 6;
/// Ticks the screen stays faded (and unsettled) after the player is hit.
pub const FADE_TICKS: i64 = 3;
const HIT_RADIUS: f64 = 1.0;
const SPAWN: (f64, f64) = (WIDTH / 2.0, HEIGHT / 2.0);

// ── Inputs ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Fire,
}

impl Button {
    pub fn tag(self) -> &'static str {
        match self {
            Button::Up    => "up",
            Button::Down  => "down",
            Button::Left  => "left",
            Button::Right => "right",
            Button::Fire  => "fire",
        }
    }

    fn delta(self) -> (f64, f64) {
        match self {
            Button::Up    => (0.0, -1.0),
            Button::Down  => (0.0, 1.0),
            Button::Left  => (-1.0, 0.0),
            Button::Right => (1.0, 0.0),
            Button::Fire  => (0.0, 0.0),
        }
    }
}

/// Keys held during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaInput {
    pub keys: Vec<Button>,
}

impl ArenaInput {
    pub fn new(keys: &[Button]) -> Self {
        Self { keys: keys.to_vec() }
    }

    pub fn idle() -> Self {
        Self::default()
    }
}

// ── Entities ────────────────────────────────────────────────────

pub struct Arena {
    pub tick:              Tick,
    pub player:            ObjRef,
    pub enemies:           SeqRef,
    pub projectiles:       SeqRef,
    /// Enemy name → times killed.
    pub kills:             MapRef,
    pub spawned:           i64,
    pub rng:               ResourceRef,
    pub map:               ObjRef,
    pub atlas:             Value,
    /// Remaining fade ticks. Input is ignored while fading.
    pub fade:              i64,
    pub raw_pressed_keys:  SeqRef,
    pub net:               Value,
    pub cheating_detected: bool,
}

impl Entity for Arena {
    fn type_name(&self) -> &'static str { "Arena" }

    fn fields(&self) -> Option<Vec<Field>> {
        Some(vec![
            ("tick".into(),              Value::Int(self.tick as i64)),
            ("player".into(),            Value::Object(self.player.clone())),
            ("enemies".into(),           Value::Seq(self.enemies.clone())),
            ("projectiles".into(),       Value::Seq(self.projectiles.clone())),
            ("kills".into(),             Value::Map(self.kills.clone())),
            ("spawned".into(),           Value::Int(self.spawned)),
            ("rng".into(),               Value::Resource(self.rng.clone())),
            ("map".into(),               Value::Object(self.map.clone())),
            ("atlas".into(),             self.atlas.clone()),
            ("fade".into(),              Value::Int(self.fade)),
            ("raw_pressed_keys".into(),  Value::Seq(self.raw_pressed_keys.clone())),
            ("net".into(),               self.net.clone()),
            ("cheating_detected".into(), Value::Bool(self.cheating_detected)),
        ])
    }

    fn set_field(&mut self, name: &str, value: Value) -> RewindResult<()> {
        match name {
            "tick"              => self.tick = value.as_int()? as Tick,
            "player"            => self.player = value.as_object()?,
            "enemies"           => self.enemies = value.as_seq()?,
            "projectiles"       => self.projectiles = value.as_seq()?,
            "kills"             => self.kills = value.as_map()?,
            "spawned"           => self.spawned = value.as_int()?,
            "rng"               => self.rng = value.as_resource()?,
            "map"               => self.map = value.as_object()?,
            "atlas"             => self.atlas = value,
            "fade"              => self.fade = value.as_int()?,
            "raw_pressed_keys"  => self.raw_pressed_keys = value.as_seq()?,
            "net"               => self.net = value,
            "cheating_detected" => self.cheating_detected = value.as_bool()?,
            other => return Err(unknown_field("Arena", other)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub x:        f64,
    pub y:        f64,
    pub hp:       i64,
    pub cooldown: i64,
    pub facing:   &'static str,
}

impl Entity for Player {
    fn type_name(&self) -> &'static str { "Player" }

    fn fields(&self) -> Option<Vec<Field>> {
        Some(vec![
            ("x".into(),        Value::Float(self.x)),
            ("y".into(),        Value::Float(self.y)),
            ("hp".into(),       Value::Int(self.hp)),
            ("cooldown".into(), Value::Int(self.cooldown)),
            ("facing".into(),   Value::Tag(self.facing)),
        ])
    }

    fn set_field(&mut self, name: &str, value: Value) -> RewindResult<()> {
        match name {
            "x"        => self.x = value.as_float()?,
            "y"        => self.y = value.as_float()?,
            "hp"       => self.hp = value.as_int()?,
            "cooldown" => self.cooldown = value.as_int()?,
            "facing"   => self.facing = as_tag(&value)?,
            other => return Err(unknown_field("Player", other)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

pub struct Enemy {
    pub name:   Rc<str>,
    pub x:      f64,
    pub y:      f64,
    pub hp:     i64,
    /// The enemy's patrol script, or `Absent` once it is dead.
    pub patrol: Value,
}

impl Entity for Enemy {
    fn type_name(&self) -> &'static str { "Enemy" }

    fn fields(&self) -> Option<Vec<Field>> {
        Some(vec![
            ("name".into(),   Value::Text(self.name.clone())),
            ("x".into(),      Value::Float(self.x)),
            ("y".into(),      Value::Float(self.y)),
            ("hp".into(),     Value::Int(self.hp)),
            ("patrol".into(), self.patrol.clone()),
        ])
    }

    fn set_field(&mut self, name: &str, value: Value) -> RewindResult<()> {
        match name {
            "name"   => self.name = value.as_text()?,
            "x"      => self.x = value.as_float()?,
            "y"      => self.y = value.as_float()?,
            "hp"     => self.hp = value.as_int()?,
            "patrol" => self.patrol = value,
            other => return Err(unknown_field("Enemy", other)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub x:   f64,
    pub y:   f64,
    pub dx:  f64,
    pub dy:  f64,
    pub ttl: i64,
}

impl Entity for Projectile {
    fn type_name(&self) -> &'static str { "Projectile" }

    fn fields(&self) -> Option<Vec<Field>> {
        Some(vec![
            ("x".into(),   Value::Float(self.x)),
            ("y".into(),   Value::Float(self.y)),
            ("dx".into(),  Value::Float(self.dx)),
            ("dy".into(),  Value::Float(self.dy)),
            ("ttl".into(), Value::Int(self.ttl)),
        ])
    }

    fn set_field(&mut self, name: &str, value: Value) -> RewindResult<()> {
        match name {
            "x"   => self.x = value.as_float()?,
            "y"   => self.y = value.as_float()?,
            "dx"  => self.dx = value.as_float()?,
            "dy"  => self.dy = value.as_float()?,
            "ttl" => self.ttl = value.as_int()?,
            other => return Err(unknown_field("Projectile", other)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

/// Static level geometry. Exposes no fields; it must be configured opaque.
#[derive(Debug)]
pub struct TileMap {
    pub width:  usize,
    pub height: usize,
    pub walls:  Vec<(usize, usize)>,
}

impl TileMap {
    pub fn is_wall(&self, x: f64, y: f64) -> bool {
        let (cx, cy) = (x.floor() as usize, y.floor() as usize);
        self.walls.contains(&(cx, cy))
    }
}

impl Entity for TileMap {
    fn type_name(&self) -> &'static str { "TileMap" }

    fn fields(&self) -> Option<Vec<Field>> {
        None
    }

    fn set_field(&mut self, name: &str, _value: Value) -> RewindResult<()> {
        Err(unknown_field("TileMap", name))
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

/// GPU-side sprite sheet stand-in. Only ever held as an opaque handle.
#[derive(Debug)]
pub struct TextureAtlas {
    pub name:   String,
    pub frames: usize,
}

/// Connection to the authority. Volatile and excluded from snapshots.
#[derive(Debug)]
pub struct NetHandle {
    pub peer: String,
}

fn as_tag(value: &Value) -> RewindResult<&'static str> {
    match value {
        Value::Tag(t) => Ok(*t),
        other => Err(RewindError::TypeMismatch { expected: "tag", found: other.kind_name() }),
    }
}

// ── Patrol script ───────────────────────────────────────────────

const LEGS: [(f64, f64); 4] = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];

/// Walks its enemy around a rectangle whose side lengths are rolled from
/// the shared rng at every corner. Yields the current leg each tick.
///
/// The enemy owns its script, so the script only holds the enemy weakly.
pub struct PatrolScript {
    enemy:          Weak<RefCell<dyn Entity>>,
    rng:            ResourceRef,
    /// Resume point: which side of the rectangle is being walked.
    pub leg:        usize,
    pub steps_left: i64,
}

impl PatrolScript {
    pub fn new(enemy: &ObjRef, rng: ResourceRef) -> Self {
        Self { enemy: Rc::downgrade(enemy), rng, leg: 0, steps_left: 0 }
    }

    fn enemy(&self) -> RewindResult<ObjRef> {
        self.enemy
            .upgrade()
            .ok_or_else(|| RewindError::Other(anyhow::anyhow!("patrol script outlived its enemy")))
    }

    fn roll_leg_length(&self) -> i64 {
        match resource_mut::<SimRng>(&self.rng) {
            Ok(mut rng) => 2 + rng.next_u64_below(4) as i64,
            Err(_) => 2,
        }
    }
}

impl Coroutine for PatrolScript {
    fn type_name(&self) -> &'static str { "PatrolScript" }

    fn resume(&mut self) -> Option<Value> {
        if self.steps_left <= 0 {
            self.leg = (self.leg + 1) % LEGS.len();
            self.steps_left = self.roll_leg_length();
        }
        let obj = self.enemy.upgrade()?;
        let mut enemy = entity_mut::<Enemy>(&obj).ok()?;
        if enemy.hp <= 0 {
            return None;
        }
        let (dx, dy) = LEGS[self.leg];
        enemy.x = (enemy.x + dx * 0.5).clamp(0.0, WIDTH - 1.0);
        enemy.y = (enemy.y + dy * 0.5).clamp(0.0, HEIGHT - 1.0);
        self.steps_left -= 1;
        Some(Value::Int(self.leg as i64))
    }

    fn suspend(&self, capture: &mut CaptureFn<'_>) -> RewindResult<Box<dyn Frame>> {
        Ok(Box::new(PatrolFrame {
            enemy:      capture(&Value::Object(self.enemy()?))?,
            rng:        capture(&Value::Resource(self.rng.clone()))?,
            leg:        self.leg,
            steps_left: self.steps_left,
        }))
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

struct PatrolFrame {
    enemy:      NodeId,
    rng:        NodeId,
    leg:        usize,
    steps_left: i64,
}

impl Frame for PatrolFrame {
    fn rebuild(&self, restore: &mut RestoreFn<'_>) -> RewindResult<Box<dyn Coroutine>> {
        Ok(Box::new(PatrolScript {
            enemy:      Rc::downgrade(&restore(self.enemy)?.as_object()?),
            rng:        restore(self.rng)?.as_resource()?,
            leg:        self.leg,
            steps_left: self.steps_left,
        }))
    }
}

// ── Simulation ──────────────────────────────────────────────────

/// Classifier entries the arena graph needs.
pub fn classifier() -> ClassifierTable {
    ClassifierTable::new()
        .with_opaque("TileMap")
        .with_exclusion("Arena", "raw_pressed_keys")
        .with_exclusion("Arena", "net")
        .with_exclusion("Arena", "cheating_detected")
}

pub struct ArenaSim {
    arena: Rc<RefCell<Arena>>,
}

impl ArenaSim {
    pub fn new(seed: u64) -> RewindResult<Self> {
        let boxed: Box<dyn Resource> = Box::new(SimRng::new(seed, 0).with_name("arena"));
        let rng: ResourceRef = Rc::new(RefCell::new(boxed));

        let player: ObjRef = Rc::new(RefCell::new(Player {
            x:        SPAWN.0,
            y:        SPAWN.1,
            hp:       PLAYER_HP,
            cooldown: 0,
            facing:   Button::Up.tag(),
        }));
        let map: ObjRef = Rc::new(RefCell::new(TileMap {
            width:  WIDTH as usize,
            height: HEIGHT as usize,
            walls:  vec![(3, 3), (3, 4), (12, 7), (12, 8)],
        }));

        let arena = Arena {
            tick:              0,
            player,
            enemies:           new_seq(SeqKind::List),
            projectiles:       new_seq(SeqKind::List),
            kills:             Rc::new(RefCell::new(BTreeMap::new())),
            spawned:           0,
            rng,
            map,
            atlas:             Value::opaque(TextureAtlas { name: "arena-sprites".into(), frames: 64 }),
            fade:              0,
            raw_pressed_keys:  new_seq(SeqKind::Set),
            net:               Value::opaque(NetHandle { peer: "localhost".into() }),
            cheating_detected: false,
        };
        let sim = Self { arena: Rc::new(RefCell::new(arena)) };
        sim.spawn_wave()?;
        Ok(sim)
    }

    pub fn arena(&self) -> &Rc<RefCell<Arena>> {
        &self.arena
    }

    /// Plain-data copy of everything observable, for comparisons.
    pub fn view(&self) -> RewindResult<ArenaView> {
        let arena = self.arena.borrow();
        let player = entity_ref::<Player>(&arena.player)?.clone();

        let mut enemies = Vec::new();
        for item in arena.enemies.borrow().items() {
            let obj = item.as_object()?;
            let enemy = entity_ref::<Enemy>(&obj)?;
            let patrol = match &enemy.patrol {
                Value::Task(task) => task
                    .borrow()
                    .as_any()
                    .downcast_ref::<PatrolScript>()
                    .map(|p| (p.leg, p.steps_left)),
                _ => None,
            };
            enemies.push(EnemyView {
                name: enemy.name.to_string(),
                x: enemy.x,
                y: enemy.y,
                hp: enemy.hp,
                patrol,
            });
        }

        let mut projectiles = Vec::new();
        for item in arena.projectiles.borrow().items() {
            projectiles.push(entity_ref::<Projectile>(&item.as_object()?)?.clone());
        }

        let mut kills = BTreeMap::new();
        for (key, count) in arena.kills.borrow().iter() {
            let name = match key {
                Key::Text(name) => name.clone(),
                other => format!("{other:?}"),
            };
            kills.insert(name, count.as_int()?);
        }

        let rng = resource_ref::<SimRng>(&arena.rng)?.clone();

        Ok(ArenaView {
            tick: arena.tick,
            player,
            enemies,
            projectiles,
            kills,
            spawned: arena.spawned,
            fade: arena.fade,
            rng,
        })
    }

    fn spawn_wave(&self) -> RewindResult<()> {
        let mut arena = self.arena.borrow_mut();
        let count = {
            let mut rng = resource_mut::<SimRng>(&arena.rng)?;
            2 + rng.next_u64_below(2)
        };
        for _ in 0..count {
            let (x, y) = {
                let mut rng = resource_mut::<SimRng>(&arena.rng)?;
                (rng.range_f64(0.0, WIDTH - 1.0), rng.range_f64(0.0, HEIGHT - 1.0))
            };
            arena.spawned += 1;
            let enemy: ObjRef = Rc::new(RefCell::new(Enemy {
                name:   Rc::from(format!("grunt-{}", arena.spawned)),
                x,
                y,
                hp:     ENEMY_HP,
                patrol: Value::Absent,
            }));
            let patrol = Value::task(PatrolScript::new(&enemy, arena.rng.clone()));
            entity_mut::<Enemy>(&enemy)?.patrol = patrol;
            arena.enemies.borrow_mut().push(Value::Object(enemy));
        }
        log::debug!("tick={} spawned wave of {count}", arena.tick);
        Ok(())
    }

    fn move_player(arena: &Arena, input: &ArenaInput) -> RewindResult<()> {
        let map = entity_ref::<TileMap>(&arena.map)?;
        let mut player = entity_mut::<Player>(&arena.player)?;
        player.cooldown = (player.cooldown - 1).max(0);

        for &button in &input.keys {
            if button == Button::Fire {
                continue;
            }
            let (dx, dy) = button.delta();
            let x = (player.x + dx).clamp(0.0, WIDTH - 1.0);
            let y = (player.y + dy).clamp(0.0, HEIGHT - 1.0);
            if !map.is_wall(x, y) {
                player.x = x;
                player.y = y;
            }
            player.facing = button.tag();
        }

        if input.keys.contains(&Button::Fire) && player.cooldown == 0 {
            let (dx, dy) = match player.facing {
                "down"  => Button::Down.delta(),
                "left"  => Button::Left.delta(),
                "right" => Button::Right.delta(),
                _       => Button::Up.delta(),
            };
            arena.projectiles.borrow_mut().push(Value::object(Projectile {
                x: player.x,
                y: player.y,
                dx: dx * PROJECTILE_SPEED,
                dy: dy * PROJECTILE_SPEED,
                ttl: PROJECTILE_TTL,
            }));
            player.cooldown = FIRE_COOLDOWN;
        }
        Ok(())
    }

    fn advance_patrols(arena: &Arena) -> RewindResult<()> {
        let enemies = arena.enemies.borrow().items().to_vec();
        for item in enemies {
            let patrol = entity_ref::<Enemy>(&item.as_object()?)?.patrol.clone();
            if let Value::Task(task) = patrol {
                task.borrow_mut().resume();
            }
        }
        Ok(())
    }

    /// Move projectiles and resolve hits. Dead enemies are removed and
    /// their patrol scripts dropped.
    fn advance_projectiles(arena: &Arena) -> RewindResult<()> {
        let projectiles = arena.projectiles.borrow().items().to_vec();
        let enemies = arena.enemies.borrow().items().to_vec();

        for item in &projectiles {
            let obj = item.as_object()?;
            let mut shot = entity_mut::<Projectile>(&obj)?;
            shot.x += shot.dx;
            shot.y += shot.dy;
            shot.ttl -= 1;

            for enemy_value in &enemies {
                let enemy_obj = enemy_value.as_object()?;
                let mut enemy = entity_mut::<Enemy>(&enemy_obj)?;
                if enemy.hp > 0 && distance(shot.x, shot.y, enemy.x, enemy.y) < HIT_RADIUS {
                    enemy.hp -= 1;
                    shot.ttl = 0;
                    if enemy.hp <= 0 {
                        enemy.patrol = Value::Absent;
                        let key = Key::Text(enemy.name.to_string());
                        let mut kills = arena.kills.borrow_mut();
                        let count = kills.get(&key).map(Value::as_int).transpose()?.unwrap_or(0);
                        kills.insert(key, Value::Int(count + 1));
                    }
                    break;
                }
            }
        }

        arena.projectiles.borrow_mut().retain(projectile_alive);
        arena.enemies.borrow_mut().retain(enemy_alive);
        Ok(())
    }

    /// Returns true when an enemy touched the player this tick.
    fn player_hit(arena: &Arena) -> RewindResult<bool> {
        let mut player = entity_mut::<Player>(&arena.player)?;
        for item in arena.enemies.borrow().items() {
            let obj = item.as_object()?;
            let enemy = entity_ref::<Enemy>(&obj)?;
            if distance(player.x, player.y, enemy.x, enemy.y) < HIT_RADIUS {
                player.hp = (player.hp - 1).max(0);
                player.x = SPAWN.0;
                player.y = SPAWN.1;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Simulation for ArenaSim {
    type Event = ArenaInput;

    fn name(&self) -> &'static str { "arena" }

    fn root(&self) -> ObjRef {
        let root: ObjRef = self.arena.clone();
        root
    }

    fn resume_marker(&self) -> String {
        format!("tick-{}", self.arena.borrow().tick)
    }

    fn step(&mut self, input: &ArenaInput) -> RewindResult<()> {
        let wave_cleared = {
            let mut arena = self.arena.borrow_mut();
            arena.tick += 1;
            {
                let mut keys = arena.raw_pressed_keys.borrow_mut();
                keys.clear();
                for button in &input.keys {
                    keys.push(Value::Tag(button.tag()));
                }
            }

            if arena.fade > 0 {
                arena.fade -= 1;
                return Ok(());
            }

            Self::move_player(&arena, input)?;
            Self::advance_patrols(&arena)?;
            Self::advance_projectiles(&arena)?;
            if Self::player_hit(&arena)? {
                arena.fade = FADE_TICKS;
                log::debug!("tick={} player hit, fading", arena.tick);
            }
            let cleared = arena.enemies.borrow().is_empty();
            cleared
        };

        if wave_cleared {
            self.spawn_wave()?;
        }
        Ok(())
    }

    fn is_settled(&self) -> bool {
        self.arena.borrow().fade == 0
    }

    fn classifier(&self) -> ClassifierTable {
        classifier()
    }
}

/// Observable arena state as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaView {
    pub tick:        Tick,
    pub player:      Player,
    pub enemies:     Vec<EnemyView>,
    pub projectiles: Vec<Projectile>,
    pub kills:       BTreeMap<String, i64>,
    pub spawned:     i64,
    pub fade:        i64,
    pub rng:         SimRng,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemyView {
    pub name:   String,
    pub x:      f64,
    pub y:      f64,
    pub hp:     i64,
    /// (leg, steps left) of a live patrol script.
    pub patrol: Option<(usize, i64)>,
}

fn new_seq(kind: SeqKind) -> SeqRef {
    Rc::new(RefCell::new(Seq::new(kind)))
}

fn projectile_alive(value: &Value) -> bool {
    let Ok(obj) = value.as_object() else { return false };
    let alive = match entity_ref::<Projectile>(&obj) {
        Ok(shot) => shot.ttl > 0 && in_bounds(shot.x, shot.y),
        Err(_) => false,
    };
    alive
}

fn enemy_alive(value: &Value) -> bool {
    let Ok(obj) = value.as_object() else { return false };
    let alive = match entity_ref::<Enemy>(&obj) {
        Ok(enemy) => enemy.hp > 0,
        Err(_) => false,
    };
    alive
}

fn distance(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}

fn in_bounds(x: f64, y: f64) -> bool {
    (0.0..WIDTH).contains(&x) && (0.0..HEIGHT).contains(&y)
}
