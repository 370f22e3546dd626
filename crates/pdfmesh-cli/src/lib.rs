// Copyright 2025 PDFMesh Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # PDFMesh CLI
//!
//! Command-line interface for the PDFMesh orchestrator.
//!
//! - `pdfmesh orchestrator`: run the orchestrator with its discovery and
//!   health loops
//! - `pdfmesh services`: list the services a running orchestrator knows
//! - `pdfmesh health`: print a running orchestrator's health summary
//!
//! The binary parses arguments with `argh`; the plain-text rendering used by
//! the inspection commands lives in [`report`].

pub mod report;
