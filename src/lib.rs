/*!
 * Search for high-quality low-discrepancy point sets.
 *
 * This crate looks for good **digital nets in base 2** and **rank-1
 * integration lattices** for quasi-Monte Carlo integration.  Given a
 * description of the desired point set (construction, size, dimension,
 * interlacing factor), a figure of merit (a weighted norm quantifying
 * equidistribution), and an exploration strategy, it returns the
 * best-scoring generator under the chosen merit.
 *
 * # Nets and constructions
 *
 * A digital net is a set of per-coordinate generating matrices over
 * GF(2); point i's coordinate j applies matrix j to the binary digits
 * of i.  Three constructions are provided by [`net`]: Sobol direction
 * numbers, polynomial lattice rules over GF(2)\[x\], and explicit
 * matrices.  Rank-1 lattices (ordinary and polynomial) live in
 * [`lattice`].
 *
 * # Figures of merit
 *
 * The **t-value** figure scores weighted coordinate projections by the
 * quality parameter of the projected net, computed by an incremental
 * GF(2) row-reduction engine ([`gf2::ProgressiveRowReducer`]) driven
 * over a minimal-change enumeration of row multisets
 * ([`composition::CompositionMaker`]).  **Coordinate-uniform** figures
 * sum a univariate kernel ([`kernel::Kernel`]) over points and
 * projections through incremental per-coordinate states, one per
 * weight shape ([`weights::Weights`]).
 *
 * # Searches
 *
 * [`search::NetSearch`] drives exhaustive, random and
 * component-by-component exploration of nets; [`lattice::LatticeSearch`]
 * adds fast CBC, which scores all candidate values of a coordinate at
 * once by cross-correlation over the cyclic structure of the unit
 * group.  A [`search::MinimumObserver`] tracks the best candidate and,
 * with early abortion enabled, cancels any candidate whose partial
 * merit already reaches the incumbent.
 *
 * # Example
 *
 * Randomly search explicit 4x4 generating matrices in dimension 2
 * under the max-norm t-value figure:
 *
 * ```
 * use lowdisc::figure::{OuterNorm, WeightedTValueFigure};
 * use lowdisc::net::{Embedding, Explicit};
 * use lowdisc::search::NetSearch;
 * use lowdisc::weights::{ProductWeights, Weights};
 *
 * let figure = WeightedTValueFigure::new(
 *     Weights::Product(ProductWeights::new(vec![1.0, 1.0])),
 *     1.0,
 *     OuterNorm::Max,
 *     1,
 * ).unwrap();
 * let search = NetSearch::<Explicit>::new((4, 4), 2, Embedding::Unilevel).unwrap();
 * let result = search.random(&figure, 50, 1234).unwrap();
 * assert!(result.merit.is_finite());
 * ```
 */

pub mod composition;
pub mod error;
pub mod fft;
pub mod figure;
pub mod filters;
pub mod gf2;
pub mod kernel;
pub mod lattice;
pub mod net;
pub mod norm;
pub mod poly;
pub mod search;
pub mod tvalue;
pub mod weights;

pub use error::{Error, Result};
pub use figure::{
    CoordUniformNetFigure, EmbeddedTValueFigure, FigureOfMerit, NoAbort, OuterNorm,
    ProgressObserver, WeightedTValueFigure,
};
pub use gf2::{GF2Matrix, ProgressiveRowReducer};
pub use net::{
    DigitalNet, Embedding, Explicit, ExplicitNet, Net, OutputFormat, PolynomialLattice, Sobol,
};
pub use search::{MinimumObserver, NetSearch, SearchResult};
