//! Constantes del ciclo de vida de definiciones.
//!
//! Los códigos de estado son opacos para este crate: sólo se copian a cada
//! snapshot de `DefinitionVersion`. El valor coincide con el código
//! "aprobado" que usan los consumidores del motor de workflows.

/// Estado asignado a todo snapshot creado por el manager.
pub const STATUS_APPROVED: i32 = 0;

/// Minor con el que nace cualquier versión creada a partir de un major.
pub const INITIAL_MINOR: u32 = 0;
